//! Deterministic simulation adapters for host tests and bench runs.
//!
//! [`SimBoard`] models a generator, an automatic transfer switch and a
//! utility feed on a virtual millisecond clock.  Time only moves when the
//! controller pauses inside a relay wait or the harness calls
//! [`SimBoard::advance`], so hour-long outage cycles run in milliseconds
//! and every timing is exact.
//!
//! [`SimOperator`] is a scripted [`OperatorPort`]: requests queued on it
//! are handed to the controller on the next service slot, and everything
//! the controller tells it is recorded.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::app::commands::{OverrideIntent, RequestDesk};
use crate::app::events::{NotifyKind, StatusSnapshot};
use crate::app::ports::{
    OperatorPort, RawInputs, Relay, RelayPort, SensorPort, TimePort, WatchdogPort,
};
use crate::config::ConfigUpdate;

/// A physical change that lands at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    at_ms: u64,
    to: bool,
}

// ───────────────────────────────────────────────────────────────
// Simulated board
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimBoard {
    now_ms: u64,
    /// Wall-clock seconds at `now_ms == 0`.  `None` models an unset clock.
    wall_base: Option<u32>,

    utility: bool,
    gen_running: bool,
    gen_pending: Option<Pending>,
    switch_on_gen: bool,
    switch_pending: Option<Pending>,
    run_relay: bool,
    connect_relay: bool,

    /// Time from run relay closed to generator output live.  `None`: the
    /// generator never starts.
    pub start_latency_ms: Option<u64>,
    /// Time from run relay open to generator output dead.  `None`: the
    /// generator never stops.
    pub stop_latency_ms: Option<u64>,
    /// Time for the transfer switch to change position.  `None`: stuck.
    pub transfer_latency_ms: Option<u64>,

    pub load_amps: f32,
    pub battery_volts: f32,
    pub watchdog_reset: bool,

    history: Vec<(u64, Relay, bool)>,
    last_feed_ms: u64,
    max_feed_gap_ms: u64,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    /// Utility up, load on utility, generator stopped, clock unset.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            wall_base: None,
            utility: true,
            gen_running: false,
            gen_pending: None,
            switch_on_gen: false,
            switch_pending: None,
            run_relay: false,
            connect_relay: false,
            start_latency_ms: Some(3_000),
            stop_latency_ms: Some(2_000),
            transfer_latency_ms: Some(1_000),
            load_amps: 5.0,
            battery_volts: 12.7,
            watchdog_reset: false,
            history: Vec::new(),
            last_feed_ms: 0,
            max_feed_gap_ms: 0,
        }
    }

    /// Utility down with the generator already carrying the load, as after
    /// a reset in the middle of an outage.
    pub fn generator_on_load() -> Self {
        Self {
            utility: false,
            gen_running: true,
            switch_on_gen: true,
            ..Self::new()
        }
    }

    /// Set the wall clock to `wall_secs` at the current instant.
    pub fn set_wall_clock(&mut self, wall_secs: u32) {
        self.wall_base = Some(wall_secs.saturating_sub((self.now_ms / 1_000) as u32));
    }

    pub fn set_utility(&mut self, present: bool) {
        if self.utility != present {
            debug!("Sim: utility {}", if present { "restored" } else { "lost" });
        }
        self.utility = present;
        self.settle();
    }

    /// Move the virtual clock forward, landing every physical change that
    /// falls due on the way.
    pub fn advance(&mut self, ms: u64) {
        let end = self.now_ms + ms;
        while let Some(at) = self.next_change().filter(|&at| at <= end) {
            self.now_ms = self.now_ms.max(at);
            self.settle();
        }
        self.now_ms = end;
        self.settle();
    }

    // ── Observations ──────────────────────────────────────────

    pub fn utility(&self) -> bool {
        self.utility
    }

    pub fn gen_running(&self) -> bool {
        self.gen_running
    }

    pub fn switch_on_generator(&self) -> bool {
        self.switch_on_gen
    }

    /// Every relay write, in order: `(time, relay, level)`.
    pub fn relay_history(&self) -> &[(u64, Relay, bool)] {
        &self.history
    }

    /// Closed-to-open intervals of the run relay.  An interval still open
    /// ends at the current time.
    pub fn run_intervals(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut since = None;
        for &(at, relay, on) in &self.history {
            if relay != Relay::Run {
                continue;
            }
            match (on, since) {
                (true, None) => since = Some(at),
                (false, Some(s)) => {
                    out.push((s, at));
                    since = None;
                }
                _ => {}
            }
        }
        if let Some(s) = since {
            out.push((s, self.now_ms));
        }
        out
    }

    /// Total time the run relay has been closed.
    pub fn runtime_ms(&self) -> u64 {
        self.run_intervals().iter().map(|(a, b)| b - a).sum()
    }

    /// Times the run relay was closed from open.
    pub fn start_count(&self) -> usize {
        self.run_intervals().len()
    }

    /// Longest stretch without a watchdog feed so far.
    pub fn max_feed_gap_ms(&self) -> u64 {
        self.max_feed_gap_ms
            .max(self.now_ms.saturating_sub(self.last_feed_ms))
    }

    // ── Physics ───────────────────────────────────────────────

    fn next_change(&self) -> Option<u64> {
        [self.gen_pending, self.switch_pending]
            .into_iter()
            .flatten()
            .map(|p| p.at_ms)
            .min()
    }

    fn settle(&mut self) {
        if let Some(p) = self.gen_pending.filter(|p| p.at_ms <= self.now_ms) {
            self.gen_running = p.to;
            self.gen_pending = None;
            debug!("Sim: generator {}", if p.to { "running" } else { "stopped" });
        }
        if let Some(p) = self.switch_pending.filter(|p| p.at_ms <= self.now_ms) {
            self.switch_on_gen = p.to;
            self.switch_pending = None;
            debug!("Sim: switch on {}", if p.to { "generator" } else { "utility" });
        }
        self.steer_switch();
    }

    /// The transfer switch moves to the generator while the connect relay
    /// is closed and the generator is live.  Otherwise it returns to
    /// utility once utility is back or the generator dies, and holds its
    /// position in between.
    fn steer_switch(&mut self) {
        let want_gen = if self.connect_relay && self.gen_running {
            true
        } else if self.utility || !self.gen_running {
            false
        } else {
            self.switch_on_gen
        };
        let heading = self.switch_pending.map_or(self.switch_on_gen, |p| p.to);
        if heading == want_gen {
            return;
        }
        self.switch_pending = if want_gen == self.switch_on_gen {
            None
        } else {
            self.transfer_latency_ms.map(|l| Pending {
                at_ms: self.now_ms + l,
                to: want_gen,
            })
        };
    }

    fn steer_generator(&mut self) {
        let heading = self.gen_pending.map_or(self.gen_running, |p| p.to);
        if heading == self.run_relay {
            return;
        }
        let latency = if self.run_relay {
            self.start_latency_ms
        } else {
            self.stop_latency_ms
        };
        self.gen_pending = if self.run_relay == self.gen_running {
            None
        } else {
            latency.map(|l| Pending {
                at_ms: self.now_ms + l,
                to: self.run_relay,
            })
        };
    }
}

impl SensorPort for SimBoard {
    fn read_inputs(&mut self) -> RawInputs {
        self.settle();
        RawInputs {
            utility_present: self.utility,
            generator_present: self.gen_running,
            on_utility: !self.switch_on_gen,
            on_generator: self.switch_on_gen,
        }
    }

    fn battery_volts(&mut self) -> f32 {
        self.battery_volts
    }

    fn load_amps(&mut self) -> f32 {
        if self.switch_on_gen { self.load_amps } else { 0.0 }
    }
}

impl RelayPort for SimBoard {
    fn set_relay(&mut self, relay: Relay, on: bool) {
        self.history.push((self.now_ms, relay, on));
        match relay {
            Relay::Run => {
                self.run_relay = on;
                self.steer_generator();
            }
            Relay::Connect => self.connect_relay = on,
        }
        self.settle();
    }

    fn relay(&self, relay: Relay) -> bool {
        match relay {
            Relay::Run => self.run_relay,
            Relay::Connect => self.connect_relay,
        }
    }
}

impl TimePort for SimBoard {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn wall_secs(&self) -> Option<u32> {
        self.wall_base.map(|b| b + (self.now_ms / 1_000) as u32)
    }

    fn pause_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

impl WatchdogPort for SimBoard {
    fn feed(&mut self) {
        let gap = self.now_ms.saturating_sub(self.last_feed_ms);
        self.max_feed_gap_ms = self.max_feed_gap_ms.max(gap);
        self.last_feed_ms = self.now_ms;
    }

    fn reset_was_watchdog(&self) -> bool {
        self.watchdog_reset
    }
}

// ───────────────────────────────────────────────────────────────
// Scripted operator
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SimOperator {
    intents: VecDeque<OverrideIntent>,
    updates: VecDeque<ConfigUpdate>,

    pub notifications: Vec<NotifyKind>,
    pub power_switches: Vec<u64>,
    pub last_status: Option<StatusSnapshot>,
    pub services: u64,
}

impl SimOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `intent` to the controller on the next service slot.
    pub fn press(&mut self, intent: OverrideIntent) {
        self.intents.push_back(intent);
    }

    pub fn submit(&mut self, update: ConfigUpdate) {
        self.updates.push_back(update);
    }

    pub fn last_state(&self) -> Option<&'static str> {
        self.last_status.as_ref().map(|s| s.state)
    }
}

impl OperatorPort for SimOperator {
    fn service(&mut self, status: &StatusSnapshot, desk: &mut RequestDesk) {
        self.services += 1;
        self.last_status = Some(status.clone());
        while let Some(update) = self.updates.pop_front() {
            if let Err(e) = desk.update_config(update) {
                warn!("SimOperator: {:?} rejected: {}", update, e);
            }
        }
        while let Some(intent) = self.intents.pop_front() {
            if !desk.push_override(intent) {
                warn!("SimOperator: request queue full, dropping {:?}", intent);
            }
        }
    }

    fn notify(&mut self, kind: NotifyKind) {
        self.notifications.push(kind);
    }

    fn power_switched(&mut self, at_ms: u64) {
        self.power_switches.push(at_ms);
    }
}
