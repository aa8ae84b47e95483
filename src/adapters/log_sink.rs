//! Log-based operator adapter.
//!
//! Implements [`OperatorPort`] by writing state changes, prompts, and
//! notification requests to the ESP-IDF logger (UART / USB-CDC in
//! production).  A web or display adapter would implement the same trait
//! and render the same snapshot.

use log::{info, warn};

use crate::app::commands::RequestDesk;
use crate::app::events::{NotifyKind, StatusSnapshot};
use crate::app::ports::OperatorPort;

/// Adapter that logs what an operator would see.  Never queues requests.
#[derive(Debug, Default)]
pub struct LogCollaborator {
    last_state: Option<&'static str>,
    last_prompt: Option<&'static str>,
    battery_weak: bool,
}

impl LogCollaborator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperatorPort for LogCollaborator {
    fn service(&mut self, status: &StatusSnapshot, _desk: &mut RequestDesk) {
        if self.last_state != Some(status.state) {
            info!(
                "STATE | {} -> {} | util={} gen={} switch={:?} load={:.1}A",
                self.last_state.unwrap_or("-"),
                status.state,
                status.utility_present,
                status.generator_present,
                status.switch,
                status.load_amps,
            );
            self.last_state = Some(status.state);
        }
        if status.prompt != self.last_prompt {
            match status.prompt {
                Some(p) => info!("PROMPT | confirm '{}' within 15 s", p),
                None => info!("PROMPT | cleared"),
            }
            self.last_prompt = status.prompt;
        }
        if status.battery_weak && !self.battery_weak {
            warn!(
                "BATTERY | weak ({:.2} V)",
                status.battery_volts.unwrap_or_default()
            );
        }
        self.battery_weak = status.battery_weak;
    }

    fn notify(&mut self, kind: NotifyKind) {
        info!("NOTIFY | {}", kind.name());
    }

    fn power_switched(&mut self, at_ms: u64) {
        info!("POWER | load re-energised at {} ms", at_ms);
    }
}
