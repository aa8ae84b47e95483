//! Function-pointer finite state machine engine for the outage cycle.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                     │
//! │  ┌────────────────────┬───────────┬──────────┬────────────────┐ │
//! │  │ StateId            │ on_enter  │ on_exit  │ on_update      │ │
//! │  ├────────────────────┼───────────┼──────────┼────────────────┤ │
//! │  │ Monitoring         │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  │ AwaitingStart      │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  │ Running            │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  │ Resting            │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  │ ReturningToUtility │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  │ Halted             │ fn(ctx)   │   -      │ fn(ctx)->Opt<> │ │
//! │  └────────────────────┴───────────┴──────────┴────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next.  Handlers never block and
//! never touch hardware: they read [`FsmContext::inputs`] and queue
//! [`context::Command`]s, which the controller executes after the tick.
//! That makes every transition testable with a synthetic clock.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum StateId {
    Monitoring = 0,
    AwaitingStart = 1,
    Running = 2,
    Resting = 3,
    ReturningToUtility = 4,
    /// Invariant failure.  No further relay commands until restart.
    Halted = 5,
}

impl StateId {
    pub const COUNT: usize = 6;

    /// Convert an index back to `StateId`.  Out-of-range falls back to
    /// `Halted`, the only state that commands nothing.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Monitoring,
            1 => Self::AwaitingStart,
            2 => Self::Running,
            3 => Self::Resting,
            4 => Self::ReturningToUtility,
            5 => Self::Halted,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Halted
            }
        }
    }

    /// True for every state that belongs to an outage cycle.
    pub fn in_outage_cycle(self) -> bool {
        !matches!(self, Self::Monitoring | Self::Halted)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

pub type StateActionFn = fn(&mut FsmContext);

/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

/// One row in the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    /// Controller clock when the current state was entered.
    entered_at_ms: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            entered_at_ms: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        self.entered_at_ms = ctx.now_ms;
        ctx.ms_in_state = 0;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  `ctx.now_ms` must already hold the
    /// controller clock for this tick.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        ctx.ms_in_state = ctx.now_ms.saturating_sub(self.entered_at_ms);

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Immediate transition, used for cycle aborts and invariant
    /// failures.  A no-op if already in `next`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.entered_at_ms = ctx.now_ms;
        ctx.ms_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
