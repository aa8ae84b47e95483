//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the control task stops feeding for more than
//! [`WATCHDOG_TIMEOUT_MS`].  Every cooperative step feeds it, so even an
//! hours-long logical wait keeps it satisfied.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

pub const WATCHDOG_TIMEOUT_MS: u32 = 60_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    was_reset: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let reason = esp_reset_reason();
                let was_reset = reason == esp_reset_reason_t_ESP_RST_TASK_WDT
                    || reason == esp_reset_reason_t_ESP_RST_INT_WDT
                    || reason == esp_reset_reason_t_ESP_RST_WDT;

                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed (60s timeout, panic on trigger)");
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    subscribed,
                    was_reset,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self { was_reset: false }
        }
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// The last reset was forced by a watchdog.
    pub fn was_reset(&self) -> bool {
        self.was_reset
    }
}
