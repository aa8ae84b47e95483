//! Relay output driver.
//!
//! A dumb actuator: remembers the last commanded level so the controller
//! can read it back, and logs (rather than panics on) a pin write error.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

pub struct RelayDriver<P> {
    pin: P,
    name: &'static str,
    on: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Take the pin and drive it low (relay released).
    pub fn new(mut pin: P, name: &'static str) -> Self {
        if let Err(e) = pin.set_low() {
            warn!("Relay {}: initial release failed: {:?}", name, e);
        }
        Self {
            pin,
            name,
            on: false,
        }
    }

    pub fn set(&mut self, on: bool) {
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => {
                if self.on != on {
                    debug!("Relay {}: {}", self.name, if on { "on" } else { "off" });
                }
                self.on = on;
            }
            Err(e) => warn!("Relay {}: write failed: {:?}", self.name, e),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
