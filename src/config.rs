//! Operator-tunable timing parameters.
//!
//! `GenConfig` is persisted as a single tagged record (see
//! [`persist`](crate::persist)).  Operators change it one field at a time
//! through [`ConfigUpdate`]; every update is range-checked before it is
//! applied, never clamped.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Record identifier written in front of every persisted config.
pub const CONFIG_TAG: &str = "GENCTL";
/// Bumped whenever the persisted layout changes.  A mismatch on load
/// discards the stored record and the event log.
pub const CONFIG_VERSION: u8 = 4;

/// Upper bound for every plain "minutes" setting.
pub const MAX_MINUTES: u16 = 999;
pub const MAX_EXERCISE_MINUTES: u16 = 120;
pub const MAX_INTERVAL_WEEKS: u8 = 9;
pub const MAX_LOAD_AMPS: u8 = 100;

/// Convert a configured minute count to controller milliseconds.
///
/// With the `secs-for-mins` feature every minute is one second, which
/// makes a full outage cycle observable on the bench.
pub const fn mins_to_ms(mins: u16) -> u64 {
    if cfg!(feature = "secs-for-mins") {
        mins as u64 * 1_000
    } else {
        mins as u64 * 60_000
    }
}

/// How long the generator runs before a rest period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunLimit {
    Minutes(u16),
    /// Never rest.
    Forever,
}

impl RunLimit {
    pub fn is_forever(self) -> bool {
        matches!(self, Self::Forever)
    }

    /// Run length in milliseconds, `None` for `Forever`.
    pub fn as_ms(self) -> Option<u64> {
        match self {
            Self::Minutes(m) => Some(mins_to_ms(m)),
            Self::Forever => None,
        }
    }
}

/// The persisted controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenConfig {
    // --- Record identity ---
    pub tag: heapless::String<8>,
    pub version: u8,

    // --- Outage cycle ---
    /// Minutes to wait after utility failure before starting.
    pub gen_delay_mins: u16,
    pub gen_run: RunLimit,
    pub gen_rest_mins: u16,
    /// Minutes the generator idles unloaded after the load returns to utility.
    pub gen_cooldown_mins: u16,
    /// Minutes of stable utility before switching back.  Must exceed the
    /// transfer switch's own minimum dwell on generator.
    pub util_return_mins: u16,
    /// Above this load current a due rest period is skipped once.
    pub load_limit_amps: u8,

    // --- Exercise ---
    /// Minutes per exercise run; 0 disables exercising.
    pub exercise_duration_mins: u16,
    /// 1 = Sunday … 7 = Saturday.
    pub exercise_weekday: u8,
    pub exercise_hour: u8,
    pub exercise_interval_weeks: u8,
    /// Wall-clock seconds of the last triggered run.
    pub exercise_last_run: u32,
}

impl Default for GenConfig {
    fn default() -> Self {
        let mut tag = heapless::String::new();
        let _ = tag.push_str(CONFIG_TAG);
        Self {
            tag,
            version: CONFIG_VERSION,

            gen_delay_mins: 1,
            gen_run: RunLimit::Minutes(30),
            gen_rest_mins: 180,
            gen_cooldown_mins: 2,
            util_return_mins: 6,
            load_limit_amps: 30,

            exercise_duration_mins: 15,
            exercise_weekday: 3, // Tuesday
            exercise_hour: 11,
            exercise_interval_weeks: 2,
            exercise_last_run: 0,
        }
    }
}

impl GenConfig {
    /// True if the record carries the current tag and format version.
    pub fn has_current_tag(&self) -> bool {
        self.tag.as_str() == CONFIG_TAG && self.version == CONFIG_VERSION
    }

    /// Range-check every operator field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for update in self.as_updates() {
            update.check()?;
        }
        Ok(())
    }

    /// Apply one field update.  The config is left untouched on rejection.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        update.check()?;
        match update {
            ConfigUpdate::GenDelayMins(v) => self.gen_delay_mins = v,
            ConfigUpdate::GenRun(v) => self.gen_run = v,
            ConfigUpdate::GenRestMins(v) => self.gen_rest_mins = v,
            ConfigUpdate::GenCooldownMins(v) => self.gen_cooldown_mins = v,
            ConfigUpdate::UtilReturnMins(v) => self.util_return_mins = v,
            ConfigUpdate::LoadLimitAmps(v) => self.load_limit_amps = v,
            ConfigUpdate::ExerciseDurationMins(v) => self.exercise_duration_mins = v,
            ConfigUpdate::ExerciseWeekday(v) => self.exercise_weekday = v,
            ConfigUpdate::ExerciseHour(v) => self.exercise_hour = v,
            ConfigUpdate::ExerciseIntervalWeeks(v) => self.exercise_interval_weeks = v,
        }
        Ok(())
    }

    /// Every operator field expressed as the update that would set it.
    fn as_updates(&self) -> [ConfigUpdate; 10] {
        [
            ConfigUpdate::GenDelayMins(self.gen_delay_mins),
            ConfigUpdate::GenRun(self.gen_run),
            ConfigUpdate::GenRestMins(self.gen_rest_mins),
            ConfigUpdate::GenCooldownMins(self.gen_cooldown_mins),
            ConfigUpdate::UtilReturnMins(self.util_return_mins),
            ConfigUpdate::LoadLimitAmps(self.load_limit_amps),
            ConfigUpdate::ExerciseDurationMins(self.exercise_duration_mins),
            ConfigUpdate::ExerciseWeekday(self.exercise_weekday),
            ConfigUpdate::ExerciseHour(self.exercise_hour),
            ConfigUpdate::ExerciseIntervalWeeks(self.exercise_interval_weeks),
        ]
    }
}

/// A single-field configuration change requested by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigUpdate {
    GenDelayMins(u16),
    GenRun(RunLimit),
    GenRestMins(u16),
    GenCooldownMins(u16),
    UtilReturnMins(u16),
    LoadLimitAmps(u8),
    ExerciseDurationMins(u16),
    ExerciseWeekday(u8),
    ExerciseHour(u8),
    ExerciseIntervalWeeks(u8),
}

impl ConfigUpdate {
    /// Check the value against the field's declared bounds.  Bounds are
    /// per-field, so an update can be rejected before it reaches the store.
    pub fn check(self) -> Result<(), ConfigError> {
        let ok = match self {
            Self::GenDelayMins(v)
            | Self::GenRestMins(v)
            | Self::GenCooldownMins(v)
            | Self::UtilReturnMins(v) => v <= MAX_MINUTES,
            Self::GenRun(RunLimit::Minutes(v)) => v <= MAX_MINUTES,
            Self::GenRun(RunLimit::Forever) => true,
            Self::LoadLimitAmps(v) => v <= MAX_LOAD_AMPS,
            Self::ExerciseDurationMins(v) => v <= MAX_EXERCISE_MINUTES,
            Self::ExerciseWeekday(v) => (1..=7).contains(&v),
            Self::ExerciseHour(v) => v <= 23,
            Self::ExerciseIntervalWeeks(v) => (1..=MAX_INTERVAL_WEEKS).contains(&v),
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed(self.bounds()))
        }
    }

    fn bounds(self) -> &'static str {
        match self {
            Self::GenDelayMins(_) => "gen_delay_mins must be 0–999",
            Self::GenRun(_) => "gen_run_mins must be 0–999 or forever",
            Self::GenRestMins(_) => "gen_rest_mins must be 0–999",
            Self::GenCooldownMins(_) => "gen_cooldown_mins must be 0–999",
            Self::UtilReturnMins(_) => "util_return_mins must be 0–999",
            Self::LoadLimitAmps(_) => "load_limit_amps must be 0–100",
            Self::ExerciseDurationMins(_) => "exercise_duration_mins must be 0–120",
            Self::ExerciseWeekday(_) => "exercise_weekday must be 1–7",
            Self::ExerciseHour(_) => "exercise_hour must be 0–23",
            Self::ExerciseIntervalWeeks(_) => "exercise_interval_weeks must be 1–9",
        }
    }

    /// Stable field number, stored as the payload of `ConfigUpdated`.
    pub fn field_id(self) -> i16 {
        match self {
            Self::GenDelayMins(_) => 1,
            Self::GenRun(_) => 2,
            Self::GenRestMins(_) => 3,
            Self::GenCooldownMins(_) => 4,
            Self::UtilReturnMins(_) => 5,
            Self::LoadLimitAmps(_) => 6,
            Self::ExerciseDurationMins(_) => 7,
            Self::ExerciseWeekday(_) => 8,
            Self::ExerciseHour(_) => 9,
            Self::ExerciseIntervalWeeks(_) => 10,
        }
    }
}
