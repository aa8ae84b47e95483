//! Shared harness: a booted controller on a [`SimBoard`].

use genctl::adapters::nvs::NvsAdapter;
use genctl::adapters::sim::{SimBoard, SimOperator};
use genctl::app::ports::{Relay, TimePort};
use genctl::app::service::Controller;
use genctl::config::ConfigUpdate;
use genctl::eventlog::{EventKind, LogEntry};

pub type Ctl = Controller<SimBoard, NvsAdapter, SimOperator>;

/// Harness tick period.  Well inside the 1 s responsiveness target.
pub const STEP_MS: u64 = 250;
pub const MIN: u64 = 60_000;

pub struct Rig {
    pub ctl: Ctl,
}

impl Rig {
    pub fn boot(board: SimBoard) -> Self {
        Self::boot_with(board, NvsAdapter::new().unwrap())
    }

    pub fn boot_with(board: SimBoard, storage: NvsAdapter) -> Self {
        Self {
            ctl: Controller::boot(board, storage, SimOperator::new()),
        }
    }

    /// Boot, then apply `updates` through the public config API.
    pub fn boot_configured(board: SimBoard, updates: &[ConfigUpdate]) -> Self {
        let mut rig = Self::boot(board);
        for &u in updates {
            rig.ctl.update_config(u).unwrap();
        }
        rig
    }

    pub fn now(&self) -> u64 {
        self.ctl.board().now_ms()
    }

    pub fn board(&self) -> &SimBoard {
        self.ctl.board()
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        self.ctl.board_mut()
    }

    pub fn operator_mut(&mut self) -> &mut SimOperator {
        self.ctl.operator_mut()
    }

    /// Tick for at least `ms` of virtual time.
    pub fn run_for(&mut self, ms: u64) {
        let end = self.now() + ms;
        while self.now() < end {
            self.ctl.tick();
            self.board_mut().advance(STEP_MS);
        }
    }

    /// Tick until `done` holds or `limit_ms` passes.  Returns whether
    /// `done` held.
    pub fn run_until(&mut self, limit_ms: u64, done: impl Fn(&Ctl) -> bool) -> bool {
        let end = self.now() + limit_ms;
        while self.now() < end {
            self.ctl.tick();
            if done(&self.ctl) {
                return true;
            }
            self.board_mut().advance(STEP_MS);
        }
        false
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.ctl.log().entries().cloned().collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.ctl.log().entries().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.ctl.log().entries().filter(|e| e.kind == kind).count()
    }

    /// Times at which `relay` was written to `on`.
    pub fn writes(&self, relay: Relay, on: bool) -> Vec<u64> {
        self.board()
            .relay_history()
            .iter()
            .filter(|&&(_, r, level)| r == relay && level == on)
            .map(|&(at, _, _)| at)
            .collect()
    }

    /// Simulate a reset: keep storage, hand back the parts.
    pub fn reset(self) -> (SimBoard, NvsAdapter) {
        let (board, storage, _) = self.ctl.into_parts();
        (board, storage)
    }
}

pub fn within(value: u64, lo: u64, hi: u64) -> bool {
    (lo..=hi).contains(&value)
}
