//! Outbound data: notification requests and the read-only status
//! snapshot handed to the operator collaborator every step.

use serde::Serialize;

use crate::config::GenConfig;
use crate::eventlog::LogEntry;

/// Entries included in a snapshot, newest first.
pub const SNAPSHOT_LOG_ENTRIES: usize = 10;

/// Fire-and-forget notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum NotifyKind {
    /// An outage cycle began.
    Failed = 0,
    /// The load is back on utility and the generator is stopped.
    Restored = 1,
    /// An exercise run started.
    Test = 2,
}

impl NotifyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Restored => "restored",
            Self::Test => "test",
        }
    }
}

/// Where the transfer switch says the load is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchPosition {
    Utility,
    Generator,
    /// Neither or both contacts read live (mid-transfer or a wiring fault).
    Unknown,
}

impl SwitchPosition {
    pub fn from_contacts(on_utility: bool, on_generator: bool) -> Self {
        match (on_utility, on_generator) {
            (true, false) => Self::Utility,
            (false, true) => Self::Generator,
            _ => Self::Unknown,
        }
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub utility_present: bool,
    pub generator_present: bool,
    pub switch: SwitchPosition,
    pub at_home: bool,
    /// Controller clock at the last time power came back on the load.
    pub last_power_on_ms: Option<u64>,
    pub battery_volts: Option<f32>,
    pub battery_weak: bool,
    pub load_amps: f32,
    pub state: &'static str,
    pub exercise_active: bool,
    pub halted: bool,
    /// Directive waiting for operator confirmation.
    pub prompt: Option<&'static str>,
    pub recent: Vec<LogEntry>,
    pub config: GenConfig,
}

impl StatusSnapshot {
    /// Render for the web collaborator.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
