//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  The controller fills in the inputs before each tick and
//! executes the queued [`Command`]s afterwards, so a handler never touches
//! a relay, the log, or the clock directly.

use crate::app::commands::Directive;
use crate::app::events::NotifyKind;
use crate::config::GenConfig;
use crate::eventlog::EventKind;

use super::StateId;

/// Most commands a single tick can queue.
pub const MAX_COMMANDS: usize = 8;

// ---------------------------------------------------------------------------
// Inputs (written by the controller before each tick)
// ---------------------------------------------------------------------------

/// Debounced inputs and operator state as of the start of this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inputs {
    pub utility_present: bool,
    pub generator_present: bool,
    pub on_utility: bool,
    pub on_generator: bool,
    /// The run relay is currently energised.
    pub run_relay: bool,
    pub load_amps: f32,
    pub at_home: bool,
    /// Confirmed override waiting for a decision point.  A handler that
    /// acts on it takes it.
    pub directive: Option<Directive>,
}

// ---------------------------------------------------------------------------
// Commands (written by handlers; executed by the controller in order)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartGenerator,
    StopGenerator,
    ConnectToGenerator,
    ConnectToUtility,
    /// Drop any exercise session without touching relays.
    CancelExercise,
    SampleBattery,
    Notify(NotifyKind),
    Record(EventKind, Option<i16>),
}

// ---------------------------------------------------------------------------
// Timing helpers
// ---------------------------------------------------------------------------

/// The single deadline the outage cycle waits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deadline {
    #[default]
    Never,
    At(u64),
}

impl Deadline {
    pub fn passed(self, now_ms: u64) -> bool {
        match self {
            Self::Never => false,
            Self::At(t) => now_ms >= t,
        }
    }
}

/// Where to pick the outage cycle back up if utility drops again during
/// the return sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub state: StateId,
    pub deadline: Deadline,
    pub keep_on: bool,
}

/// Sub-phase of [`StateId::ReturningToUtility`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnPhase {
    /// Waiting for utility to prove stable.
    #[default]
    Settling,
    /// Connect-to-utility has been issued.
    Reconnecting,
    /// Load is on utility; generator idles unloaded.
    CoolingDown,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Controller clock at the start of this tick.
    pub now_ms: u64,
    /// Milliseconds since the current state was entered.
    pub ms_in_state: u64,

    // -- Inputs --
    pub inputs: Inputs,
    pub config: GenConfig,

    // -- Outputs --
    pub commands: heapless::Vec<Command, MAX_COMMANDS>,
    /// A handler tried to queue more than [`MAX_COMMANDS`].
    pub commands_overflowed: bool,

    // -- Outage cycle --
    pub deadline: Deadline,
    /// Run indefinitely until the cycle ends or the operator rests it.
    pub keep_on: bool,
    pub resume: Option<Resume>,
    pub return_phase: ReturnPhase,
    pub battery_sampled: bool,
}

impl FsmContext {
    pub fn new(config: GenConfig) -> Self {
        Self {
            now_ms: 0,
            ms_in_state: 0,
            inputs: Inputs::default(),
            config,
            commands: heapless::Vec::new(),
            commands_overflowed: false,
            deadline: Deadline::Never,
            keep_on: false,
            resume: None,
            return_phase: ReturnPhase::Settling,
            battery_sampled: false,
        }
    }

    pub fn push(&mut self, cmd: Command) {
        if self.commands.push(cmd).is_err() {
            self.commands_overflowed = true;
        }
    }

    pub fn record(&mut self, kind: EventKind, payload: Option<i16>) {
        self.push(Command::Record(kind, payload));
    }

    /// Take the pending directive if it matches `want`.
    pub fn take_directive(&mut self, want: Directive) -> bool {
        if self.inputs.directive == Some(want) {
            self.inputs.directive = None;
            true
        } else {
            false
        }
    }

    /// A deadline `ms` from now.
    pub fn after(&self, ms: u64) -> Deadline {
        Deadline::At(self.now_ms.saturating_add(ms))
    }

    /// Take the resume record if it targets `state`.
    pub fn take_resume(&mut self, state: StateId) -> Option<Resume> {
        match self.resume {
            Some(r) if r.state == state => self.resume.take(),
            _ => None,
        }
    }
}
