//! Exercise scheduler: periodic no-load generator test runs.
//!
//! Runs alongside the outage state machine but only while the controller
//! is monitoring on utility power.  The scheduler decides; the controller
//! acts: [`ExerciseScheduler::poll`] returns an [`ExerciseAction`], and the
//! controller persists the trigger time, drives the run relay, and logs.
//!
//! ```text
//!            ┌──────────────── poll() each step ───────────────┐
//!            │                                                 │
//!   IDLE ──[weekday+hour match, interval elapsed | StartNow]──▶ ACTIVE
//!    ▲                                                         │
//!    └──[elapsed ≥ duration | duration → 0 | StopOrRest]───────┘
//!    └──[outage entry: cancel(), relays untouched]─────────────┘
//! ```
//!
//! The load never moves: an exercise only closes the run relay.

use log::info;

use crate::app::commands::Directive;
use crate::config::{GenConfig, mins_to_ms};

// ═══════════════════════════════════════════════════════════════
//  Calendar helpers
// ═══════════════════════════════════════════════════════════════

pub const SECS_PER_HOUR: u32 = 3_600;
pub const SECS_PER_DAY: u32 = 86_400;
pub const SECS_PER_WEEK: u32 = 7 * SECS_PER_DAY;

/// Wall-clock readings before 2020-01-01 mean the clock was never set.
pub const WALL_CLOCK_VALID_AFTER: u32 = 1_577_836_800;

/// A scheduled slot may fire this early relative to the full interval,
/// so a run that started late last time does not skip this week's slot.
pub const TRIGGER_GRACE_SECS: u32 = SECS_PER_HOUR;

/// Day of week, 1 = Sunday … 7 = Saturday (UTC).
pub fn weekday(wall_secs: u32) -> u8 {
    // 1970-01-01 was a Thursday.
    ((wall_secs / SECS_PER_DAY + 4) % 7 + 1) as u8
}

/// Hour of day, 0–23 (UTC).
pub fn hour(wall_secs: u32) -> u8 {
    ((wall_secs % SECS_PER_DAY) / SECS_PER_HOUR) as u8
}

// ═══════════════════════════════════════════════════════════════
//  Session and actions
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExerciseSession {
    pub active: bool,
    /// Controller clock when the run started.
    pub start_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseAction {
    /// Begin a run.  `forced` runs come from an operator directive.
    Start { forced: bool },
    Stop,
}

#[derive(Debug, Default)]
pub struct ExerciseScheduler {
    session: ExerciseSession,
}

impl ExerciseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    /// Decide what, if anything, should happen this step.
    ///
    /// `directive` is a confirmed operator override that no outage state
    /// consumed: `StartNow` forces a run, `StopOrRest` ends one.
    pub fn poll(
        &self,
        now_ms: u64,
        wall_secs: Option<u32>,
        cfg: &GenConfig,
        directive: Option<Directive>,
    ) -> Option<ExerciseAction> {
        if self.session.active {
            let elapsed = now_ms.saturating_sub(self.session.start_ms);
            let done = cfg.exercise_duration_mins == 0
                || elapsed >= mins_to_ms(cfg.exercise_duration_mins)
                || directive == Some(Directive::StopOrRest);
            return done.then_some(ExerciseAction::Stop);
        }

        if cfg.exercise_duration_mins == 0 {
            return None;
        }
        if directive == Some(Directive::StartNow) {
            return Some(ExerciseAction::Start { forced: true });
        }
        let wall = wall_secs.filter(|&w| w > WALL_CLOCK_VALID_AFTER)?;
        Self::is_due(wall, cfg).then_some(ExerciseAction::Start { forced: false })
    }

    /// Weekday and hour match, and a full interval (less the grace) has
    /// passed since the last run.
    pub fn is_due(wall_secs: u32, cfg: &GenConfig) -> bool {
        let interval = u32::from(cfg.exercise_interval_weeks) * SECS_PER_WEEK;
        weekday(wall_secs) == cfg.exercise_weekday
            && hour(wall_secs) == cfg.exercise_hour
            && wall_secs.saturating_sub(cfg.exercise_last_run)
                >= interval.saturating_sub(TRIGGER_GRACE_SECS)
    }

    pub fn begin(&mut self, now_ms: u64) {
        info!("Exercise: session started");
        self.session = ExerciseSession {
            active: true,
            start_ms: now_ms,
        };
    }

    /// Forget the session without touching any relay.  Returns whether a
    /// session was active.
    pub fn cancel(&mut self) -> bool {
        let was = self.session.active;
        if was {
            info!("Exercise: session cancelled");
        }
        self.session = ExerciseSession::default();
        was
    }
}
