//! Timed relay command primitives.
//!
//! Each operation drives one relay and then waits, bounded, for the
//! debounced inputs to confirm the effect.  A wait never sleeps for more
//! than one poll interval at a time: every iteration runs the cooperative
//! step, which refreshes the inputs, services the operator surface, and
//! feeds the watchdog.
//!
//! ```text
//!  start_generator      Run ↑      wait ≤30s  generator present
//!  stop_generator       Run ↓      wait ≤5s   generator absent   (best effort)
//!  connect_to_generator Connect ↑  wait ≤10s  switch on generator
//!  connect_to_utility   Connect ↓  wait ≤10s  switch on utility
//! ```
//!
//! No operation retries.  Retry policy belongs to the caller.

use log::{info, warn};

use crate::app::ports::Relay;
use crate::error::{RelayFault, RelayOp};
use crate::eventlog::EventKind;
use crate::sensors::debounce::SignalSet;

/// Everything a bounded wait needs from its owner.
pub trait Cooperative {
    /// Refresh inputs, service collaborators, feed the watchdog.
    fn step(&mut self);
    fn now_ms(&self) -> u64;
    /// Sleep for at most one poll interval.
    fn pause_ms(&mut self, ms: u32);
    /// Debounced inputs as of the last step.
    fn signals(&self) -> &SignalSet;
    fn drive(&mut self, relay: Relay, on: bool);
    /// Append to the durable event log.
    fn record(&mut self, kind: EventKind, payload: Option<i16>);
    /// Drop any exercise session without touching relays.
    fn cancel_exercise(&mut self);
}

/// Response windows for each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTimeouts {
    pub start_ms: u64,
    pub stop_ms: u64,
    pub connect_ms: u64,
    pub poll_ms: u32,
}

impl Default for RelayTimeouts {
    fn default() -> Self {
        Self {
            start_ms: 30_000,
            stop_ms: 5_000,
            connect_ms: 10_000,
            poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelayController {
    timeouts: RelayTimeouts,
}

impl RelayController {
    pub fn new(timeouts: RelayTimeouts) -> Self {
        Self { timeouts }
    }

    /// Close the run contact and wait for the generator to come up.
    pub fn start_generator(&self, io: &mut impl Cooperative) -> Result<(), RelayFault> {
        info!("Relay: starting generator");
        io.record(EventKind::GenOn, None);
        io.drive(Relay::Run, true);
        if self.wait(io, self.timeouts.start_ms, |s| s.generator_present()) {
            return Ok(());
        }
        warn!("Relay: generator did not start");
        io.drive(Relay::Run, false);
        io.record(EventKind::GenOnFail, None);
        Err(RelayFault::Timeout(RelayOp::StartGenerator))
    }

    /// Open the run contact and wait for the generator to stop.
    ///
    /// Some transfer switches manage their own stop timing and ignore the
    /// contact, so a timeout is logged and the relay is left open.
    pub fn stop_generator(&self, io: &mut impl Cooperative) -> Result<(), RelayFault> {
        info!("Relay: stopping generator");
        io.record(EventKind::GenOff, None);
        io.drive(Relay::Run, false);
        io.cancel_exercise();
        if self.wait(io, self.timeouts.stop_ms, |s| !s.generator_present()) {
            return Ok(());
        }
        warn!("Relay: generator still running after stop");
        io.record(EventKind::GenOffFail, None);
        Err(RelayFault::Timeout(RelayOp::StopGenerator))
    }

    /// Close the connect contact and wait for the switch to reach the
    /// generator.  Succeeds at once if it is already there.
    pub fn connect_to_generator(&self, io: &mut impl Cooperative) -> Result<(), RelayFault> {
        info!("Relay: connecting load to generator");
        io.record(EventKind::GenConnect, None);
        if io.signals().on_generator() {
            return Ok(());
        }
        if !io.signals().generator_present() {
            warn!("Relay: refusing generator connect, generator not running");
            io.record(EventKind::GenConnectBadState, None);
            return Err(RelayFault::PreconditionViolated(RelayOp::ConnectToGenerator));
        }
        io.drive(Relay::Connect, true);
        if self.wait(io, self.timeouts.connect_ms, |s| s.on_generator()) {
            return Ok(());
        }
        warn!("Relay: switch did not move to generator");
        io.record(EventKind::GenConnectFail, None);
        Err(RelayFault::Timeout(RelayOp::ConnectToGenerator))
    }

    pub fn connect_to_utility(&self, io: &mut impl Cooperative) -> Result<(), RelayFault> {
        info!("Relay: connecting load to utility");
        io.record(EventKind::UtilConnect, None);
        if io.signals().on_utility() {
            return Ok(());
        }
        if !io.signals().utility_present() {
            warn!("Relay: refusing utility connect, utility not present");
            io.record(EventKind::UtilConnectBadState, None);
            return Err(RelayFault::PreconditionViolated(RelayOp::ConnectToUtility));
        }
        io.drive(Relay::Connect, false);
        if self.wait(io, self.timeouts.connect_ms, |s| s.on_utility()) {
            return Ok(());
        }
        warn!("Relay: switch did not move to utility");
        io.record(EventKind::UtilConnectFail, None);
        Err(RelayFault::Timeout(RelayOp::ConnectToUtility))
    }

    /// Poll `done` until it holds or `timeout_ms` passes.
    fn wait(
        &self,
        io: &mut impl Cooperative,
        timeout_ms: u64,
        done: impl Fn(&SignalSet) -> bool,
    ) -> bool {
        let started = io.now_ms();
        loop {
            io.step();
            if done(io.signals()) {
                return true;
            }
            if io.now_ms().saturating_sub(started) >= timeout_ms {
                return false;
            }
            io.pause_ms(self.timeouts.poll_ms);
        }
    }
}
