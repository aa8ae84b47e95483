//! Controller: the hexagonal core.
//!
//! [`Controller`] owns the outage FSM, the relay command layer, and a
//! [`ControlIo`] that aggregates every piece of mutable core state: the
//! board, storage, operator collaborator, debounced signals, event log,
//! config, and exercise session.  Nothing is global.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────────┐ ──▶ OperatorPort
//!                 │           Controller             │
//!   RelayPort ◀── │  FSM · RelayController · Exercise│ ◀── RequestDesk
//!                 └──────────────┬───────────────────┘
//!                                ▼
//!                     StoragePort (config + log)
//! ```
//!
//! One [`Controller::tick`] is: cooperative step, FSM tick, execute the
//! queued commands in order, then the exercise scheduler if monitoring.
//! Relay commands block in bounded polling waits, and each wait iteration
//! runs the same cooperative step.

use log::{debug, error, info, warn};

use crate::config::{ConfigUpdate, GenConfig};
use crate::control::relay::{Cooperative, RelayController};
use crate::error::{Error, RelayFault, RelayOp};
use crate::eventlog::{EventKind, EventLog, LogEntry, LogOpen};
use crate::fsm::context::{Command, FsmContext, Inputs};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::persist::{ConfigLoad, ConfigStore, log_capacity_for};
use crate::scheduler::{ExerciseAction, ExerciseScheduler, WALL_CLOCK_VALID_AFTER};
use crate::sensors::battery::{BatteryChange, BatteryMonitor, centivolts};
use crate::sensors::debounce::SignalSet;

use super::commands::{Directive, OverrideIntent, PromptGate, RequestDesk};
use super::events::{NotifyKind, SNAPSHOT_LOG_ENTRIES, StatusSnapshot, SwitchPosition};
use super::ports::{Board, ConfigError, OperatorPort, Relay, StoragePort};

// ───────────────────────────────────────────────────────────────
// ControlIo: owned core state + the cooperative step
// ───────────────────────────────────────────────────────────────

/// Every mutable resource of the control thread.
pub struct ControlIo<B, S, O> {
    board: B,
    storage: S,
    operator: O,

    signals: SignalSet,
    log: EventLog,
    config: GenConfig,

    desk: RequestDesk,
    prompt: PromptGate,
    /// Confirmed override not yet consumed by a decision point.
    directive: Option<Directive>,
    at_home: bool,

    battery: BatteryMonitor,
    load_amps: f32,
    last_power_on_ms: Option<u64>,
    exercise: ExerciseScheduler,

    state_name: &'static str,
    halted: bool,
}

impl<B: Board, S: StoragePort, O: OperatorPort> ControlIo<B, S, O> {
    /// Seconds for log timestamps: wall clock when set, else uptime.
    fn timestamp(&self) -> u32 {
        self.wall_secs()
            .unwrap_or_else(|| (self.board.now_ms() / 1_000) as u32)
    }

    fn wall_secs(&self) -> Option<u32> {
        self.board
            .wall_secs()
            .filter(|&w| w > WALL_CLOCK_VALID_AFTER)
    }

    fn record_text(&mut self, kind: EventKind, payload: Option<i16>, text: Option<&str>) {
        let entry = LogEntry::new(self.timestamp(), kind, payload, text);
        if let Err(e) = self.log.append(&mut self.storage, entry) {
            warn!("Controller: durable log write failed: {}", e);
        }
    }

    fn notify(&mut self, kind: NotifyKind) {
        info!("Controller: notification '{}'", kind.name());
        self.record(EventKind::NotifyQueued, Some(kind as i16));
        self.operator.notify(kind);
    }

    fn sample_battery(&mut self) {
        let volts = self.board.battery_volts();
        let cv = centivolts(volts);
        self.record(EventKind::BatteryRead, Some(cv));
        match self.battery.sample(volts) {
            BatteryChange::BecameWeak => {
                warn!("Controller: starter battery weak ({:.2} V)", volts);
                self.record(EventKind::BatteryWeak, Some(cv));
            }
            BatteryChange::Recovered => info!("Controller: starter battery recovered"),
            BatteryChange::Unchanged => {}
        }
    }

    /// Validate, persist, then adopt a single-field change.
    fn apply_update(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let mut next = self.config.clone();
        next.apply(update)?;
        ConfigStore::save(&mut self.storage, &next)?;
        self.config = next;
        info!("Controller: config updated: {:?}", update);
        self.record(EventKind::ConfigUpdated, Some(update.field_id()));
        Ok(())
    }

    /// Drain everything the operator queued during its service slot.
    fn drain_desk(&mut self, now_ms: u64) {
        while let Some(update) = self.desk.next_update() {
            if let Err(e) = self.apply_update(update) {
                warn!("Controller: config update {:?} rejected: {}", update, e);
            }
        }
        while let Some(intent) = self.desk.next_override() {
            match intent {
                OverrideIntent::ForceStart => self.prompt.arm(Directive::StartNow, now_ms),
                OverrideIntent::ForceStopOrRest => self.prompt.arm(Directive::StopOrRest, now_ms),
                OverrideIntent::ToggleAtHome => {
                    self.at_home = !self.at_home;
                    info!("Controller: at-home {}", if self.at_home { "on" } else { "off" });
                    let kind = if self.at_home {
                        EventKind::AtHomeOn
                    } else {
                        EventKind::AtHomeOff
                    };
                    self.record(kind, None);
                }
                OverrideIntent::ConfirmPendingPrompt => match self.prompt.confirm(now_ms) {
                    Some(d) => {
                        info!("Controller: override confirmed: {:?}", d);
                        self.directive = Some(d);
                    }
                    None => debug!("Controller: nothing to confirm"),
                },
            }
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let now = self.board.now_ms();
        StatusSnapshot {
            utility_present: self.signals.utility_present(),
            generator_present: self.signals.generator_present(),
            switch: SwitchPosition::from_contacts(
                self.signals.on_utility(),
                self.signals.on_generator(),
            ),
            at_home: self.at_home,
            last_power_on_ms: self.last_power_on_ms,
            battery_volts: self.battery.volts(),
            battery_weak: self.battery.is_weak(),
            load_amps: self.load_amps,
            state: self.state_name,
            exercise_active: self.exercise.is_active(),
            halted: self.halted,
            prompt: self.prompt.pending(now).map(|d| match d {
                Directive::StartNow => "start",
                Directive::StopOrRest => "stop",
            }),
            recent: self.log.recent(SNAPSHOT_LOG_ENTRIES).cloned().collect(),
            config: self.config.clone(),
        }
    }
}

impl<B: Board, S: StoragePort, O: OperatorPort> Cooperative for ControlIo<B, S, O> {
    fn step(&mut self) {
        let now = self.board.now_ms();

        // Signals are refreshed once, here, and held for the rest of the step.
        let raw = self.board.read_inputs();
        let refresh = self.signals.refresh(raw, now);
        if refresh.power_switched(&self.signals) {
            self.last_power_on_ms = Some(now);
            self.operator.power_switched(now);
        }
        self.load_amps = self.board.load_amps();

        self.prompt.expire(now);
        let status = self.snapshot();
        self.operator.service(&status, &mut self.desk);
        self.drain_desk(now);

        self.board.feed();
    }

    fn now_ms(&self) -> u64 {
        self.board.now_ms()
    }

    fn pause_ms(&mut self, ms: u32) {
        self.board.pause_ms(ms);
    }

    fn signals(&self) -> &SignalSet {
        &self.signals
    }

    fn drive(&mut self, relay: Relay, on: bool) {
        if self.halted {
            warn!("Controller: halted, ignoring {:?} -> {}", relay, on);
            return;
        }
        self.board.set_relay(relay, on);
    }

    fn record(&mut self, kind: EventKind, payload: Option<i16>) {
        self.record_text(kind, payload, None);
    }

    fn cancel_exercise(&mut self) {
        self.exercise.cancel();
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<B, S, O> {
    relays: RelayController,
    fsm: Fsm,
    ctx: FsmContext,
    io: ControlIo<B, S, O>,
}

impl<B: Board, S: StoragePort, O: OperatorPort> Controller<B, S, O> {
    /// Boot with the default relay timeouts.
    pub fn boot(board: B, storage: S, operator: O) -> Self {
        Self::boot_with(RelayController::default(), board, storage, operator)
    }

    /// Load config, rehydrate the log, seed the signals, and pick the
    /// starting state.
    pub fn boot_with(relays: RelayController, board: B, mut storage: S, operator: O) -> Self {
        // ── 1. Config and log ─────────────────────────────────
        let (config, reinitialised) = match ConfigStore::load(&mut storage) {
            ConfigLoad::Loaded(cfg) => (cfg, false),
            ConfigLoad::FirstBoot(cfg) => (cfg, true),
            ConfigLoad::Reinitialised(cfg, e) => {
                warn!("Controller: stored config unusable ({}), defaults in use", e);
                (cfg, true)
            }
        };
        let capacity = log_capacity_for(storage.capacity_bytes());
        let (mut log, opened) = EventLog::open(&mut storage, capacity);
        if reinitialised && !log.is_empty() {
            warn!("Controller: config reinitialised, clearing event log");
            if let Err(e) = log.clear(&mut storage) {
                warn!("Controller: log clear failed: {}", e);
            }
        }

        // ── 2. Seed signals from a live read ──────────────────
        let mut board = board;
        let now = board.now_ms();
        let signals = SignalSet::seed(board.read_inputs());
        let load_amps = board.load_amps();
        let watchdog_reset = board.reset_was_watchdog();

        let mut io = ControlIo {
            board,
            storage,
            operator,
            signals,
            log,
            config: config.clone(),
            desk: RequestDesk::new(),
            prompt: PromptGate::default(),
            directive: None,
            at_home: false,
            battery: BatteryMonitor::new(),
            load_amps,
            last_power_on_ms: signals.power_present().then_some(now),
            exercise: ExerciseScheduler::new(),
            state_name: "Monitoring",
            halted: false,
        };

        io.record(EventKind::Startup, None);
        if watchdog_reset {
            warn!("Controller: last reset was the watchdog");
            io.record(EventKind::WatchdogReset, None);
        }
        if reinitialised {
            io.record_text(EventKind::ConfigUpdated, None, Some("defaults"));
        }
        if opened == LogOpen::Reinitialised {
            io.record_text(EventKind::Misc, None, Some("log reset"));
        }

        // ── 3. Starting state ─────────────────────────────────
        let mut ctx = FsmContext::new(config);
        ctx.now_ms = now;
        let mut fsm = Fsm::new(build_state_table(), StateId::Monitoring);
        fsm.start(&mut ctx);

        let mut ctl = Self {
            relays,
            fsm,
            ctx,
            io,
        };

        if let Err(msg) = ctl.io.log.check_invariants() {
            ctl.halt(msg);
            return ctl;
        }

        let s = ctl.io.signals;
        if !s.utility_present() && s.generator_present() && s.on_generator() {
            warn!("Controller: booted with generator already on load");
            ctl.io.record(EventKind::AmbiguousStart, None);
            ctl.load_inputs(now);
            ctl.fsm.force_transition(StateId::Running, &mut ctl.ctx);
            ctl.run_commands();
        }
        ctl.sync_state();
        info!(
            "Controller: booted in {} ({} log entries)",
            ctl.fsm.state_name(),
            ctl.io.log.len()
        );
        ctl
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control cycle.  Call at least once a second.
    pub fn tick(&mut self) {
        self.io.step();
        if self.io.halted {
            return;
        }

        let now = self.io.now_ms();
        self.load_inputs(now);
        let before = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        let after = self.fsm.current_state();
        let leftover = self.ctx.inputs.directive.take();

        if self.ctx.commands_overflowed {
            self.halt("fsm command queue overflow");
            return;
        }
        self.run_commands();
        if self.io.halted {
            return;
        }

        if self.fsm.current_state() == StateId::Monitoring {
            self.run_exercise(now, leftover);
        } else if before == after {
            // Not consumed yet; keep it for the next decision point
            // unless a newer one arrived meanwhile.
            self.io.directive = self.io.directive.or(leftover);
        } else if let Some(d) = leftover {
            debug!("Controller: dropping {:?} on state change", d);
        }

        if self.fsm.current_state().in_outage_cycle() && self.io.exercise.is_active() {
            self.halt("exercise active during outage cycle");
            return;
        }
        if let Err(msg) = self.io.log.check_invariants() {
            self.halt(msg);
            return;
        }
        self.sync_state();
    }

    fn load_inputs(&mut self, now_ms: u64) {
        let s = &self.io.signals;
        self.ctx.now_ms = now_ms;
        self.ctx.inputs = Inputs {
            utility_present: s.utility_present(),
            generator_present: s.generator_present(),
            on_utility: s.on_utility(),
            on_generator: s.on_generator(),
            run_relay: self.io.board.relay(Relay::Run),
            load_amps: self.io.load_amps,
            at_home: self.io.at_home,
            directive: self.io.directive.take(),
        };
        self.ctx.config = self.io.config.clone();
    }

    /// Execute what the FSM queued, in order.  A failed start or connect
    /// aborts the cycle and skips the rest of the queue.
    fn run_commands(&mut self) {
        let commands = core::mem::take(&mut self.ctx.commands);
        for cmd in commands {
            let result = match cmd {
                Command::StartGenerator => self.relays.start_generator(&mut self.io),
                Command::ConnectToGenerator => self.relays.connect_to_generator(&mut self.io),
                Command::ConnectToUtility => self.relays.connect_to_utility(&mut self.io),
                Command::StopGenerator => {
                    // Best effort: a timeout is logged and the cycle goes on.
                    let _ = self.relays.stop_generator(&mut self.io);
                    Ok(())
                }
                Command::CancelExercise => {
                    self.io.exercise.cancel();
                    Ok(())
                }
                Command::SampleBattery => {
                    self.io.sample_battery();
                    Ok(())
                }
                Command::Notify(kind) => {
                    self.io.notify(kind);
                    Ok(())
                }
                Command::Record(kind, payload) => {
                    self.io.record(kind, payload);
                    Ok(())
                }
            };
            if let Err(fault) = result {
                self.abort_cycle(fault);
                return;
            }
        }
    }

    /// Drop the current cycle and leave the relays in a state the next
    /// cycle can start from.  While the switch still holds the load on the
    /// generator both relays stay put, so the load keeps its power and the
    /// next monitoring tick retries the return.  Otherwise the connect
    /// contact opens and the generator is stopped.
    fn abort_cycle(&mut self, fault: RelayFault) {
        warn!("Controller: {}, aborting cycle", Error::Relay(fault));
        let code = match fault.op() {
            RelayOp::StartGenerator => 1,
            RelayOp::StopGenerator => 2,
            RelayOp::ConnectToGenerator => 3,
            RelayOp::ConnectToUtility => 4,
        };
        self.io.record(EventKind::CycleAborted, Some(code));
        self.ctx.commands.clear();

        if !self.io.signals.on_generator() {
            self.io.drive(Relay::Connect, false);
            if self.io.board.relay(Relay::Run) {
                // Best effort, as in the cycle itself.
                let _ = self.relays.stop_generator(&mut self.io);
            }
        }
        self.fsm.force_transition(StateId::Monitoring, &mut self.ctx);
        self.sync_state();
    }

    /// Enter the read-only failure mode.  Relays stay where they are.
    fn halt(&mut self, reason: &'static str) {
        error!("Controller: {}", Error::Invariant(reason));
        self.io.record_text(EventKind::Assertion, None, Some(reason));
        self.io.halted = true;
        self.fsm.force_transition(StateId::Halted, &mut self.ctx);
        self.sync_state();
    }

    fn sync_state(&mut self) {
        self.io.state_name = self.fsm.state_name();
    }

    // ── Exercise ──────────────────────────────────────────────

    fn run_exercise(&mut self, now_ms: u64, directive: Option<Directive>) {
        let s = &self.io.signals;
        if !s.utility_present() || !s.on_utility() {
            return;
        }
        let wall = self.io.wall_secs();
        match self
            .io
            .exercise
            .poll(now_ms, wall, &self.io.config, directive)
        {
            Some(ExerciseAction::Start { forced }) => self.start_exercise(now_ms, wall, forced),
            Some(ExerciseAction::Stop) => self.stop_exercise(),
            None => {}
        }
    }

    fn start_exercise(&mut self, now_ms: u64, wall: Option<u32>, forced: bool) {
        info!("Controller: exercise run ({})", if forced { "manual" } else { "scheduled" });
        // Persist the trigger before the relay moves, so a reset
        // mid-run cannot fire the same slot twice.
        if let Some(w) = wall {
            let mut next = self.io.config.clone();
            next.exercise_last_run = w;
            let saved = ConfigStore::save(&mut self.io.storage, &next);
            // Adopted either way: the slot must not retrigger every tick.
            self.io.config = next;
            if let Err(e) = saved {
                warn!("Controller: could not persist exercise time: {}", e);
                self.io
                    .record_text(EventKind::Misc, None, Some("exercise save fail"));
                if !forced {
                    info!("Controller: scheduled exercise skipped");
                    return;
                }
            }
        }
        self.io.record(EventKind::ExerciseStart, Some(i16::from(forced)));
        self.io.notify(NotifyKind::Test);
        self.io.exercise.begin(now_ms);
        if self.relays.start_generator(&mut self.io).is_err() {
            self.io.exercise.cancel();
        }
    }

    fn stop_exercise(&mut self) {
        let _ = self.relays.stop_generator(&mut self.io);
        self.io.exercise.cancel();
        self.io.record(EventKind::ExerciseEnd, None);
    }

    // ── Collaborator API ──────────────────────────────────────

    pub fn snapshot(&self) -> StatusSnapshot {
        self.io.snapshot()
    }

    /// Validate, persist and apply a single-field change.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        update.check()?;
        self.io.apply_update(update)
    }

    /// Queue an override intent.  Returns `false` if the queue is full.
    pub fn push_override(&mut self, intent: OverrideIntent) -> bool {
        self.io.desk.push_override(intent)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_halted(&self) -> bool {
        self.io.halted
    }

    pub fn config(&self) -> &GenConfig {
        &self.io.config
    }

    pub fn log(&self) -> &EventLog {
        &self.io.log
    }

    pub fn signals(&self) -> &SignalSet {
        &self.io.signals
    }

    pub fn at_home(&self) -> bool {
        self.io.at_home
    }

    pub fn exercise_active(&self) -> bool {
        self.io.exercise.is_active()
    }

    pub fn board(&self) -> &B {
        &self.io.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.io.board
    }

    pub fn operator(&self) -> &O {
        &self.io.operator
    }

    pub fn operator_mut(&mut self) -> &mut O {
        &mut self.io.operator
    }

    /// Give the board and storage back, e.g. to simulate a reset.
    pub fn into_parts(self) -> (B, S, O) {
        (self.io.board, self.io.storage, self.io.operator)
    }
}
