//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`], both relay drivers, the clock, and the
//! watchdog, exposing them through [`SensorPort`], [`RelayPort`],
//! [`TimePort`] and [`WatchdogPort`] (together, a
//! [`Board`](crate::app::ports::Board)).  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets the
//! underlying drivers use cfg-gated simulation stubs.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RawInputs, Relay, RelayPort, SensorPort, TimePort, WatchdogPort};
use crate::drivers::relay::RelayDriver;
use crate::drivers::watchdog::Watchdog;
use crate::sensors::SensorHub;

use super::time::Esp32TimeAdapter;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P, R> {
    sensor_hub: SensorHub<P>,
    run: RelayDriver<R>,
    connect: RelayDriver<R>,
    time: Esp32TimeAdapter,
    watchdog: Watchdog,
}

impl<P: InputPin, R: OutputPin> HardwareAdapter<P, R> {
    pub fn new(
        sensor_hub: SensorHub<P>,
        run: RelayDriver<R>,
        connect: RelayDriver<R>,
        time: Esp32TimeAdapter,
        watchdog: Watchdog,
    ) -> Self {
        Self {
            sensor_hub,
            run,
            connect,
            time,
            watchdog,
        }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: InputPin, R: OutputPin> SensorPort for HardwareAdapter<P, R> {
    fn read_inputs(&mut self) -> RawInputs {
        self.sensor_hub.read_inputs()
    }

    fn battery_volts(&mut self) -> f32 {
        self.sensor_hub.battery_volts()
    }

    fn load_amps(&mut self) -> f32 {
        self.sensor_hub.load_amps()
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<P: InputPin, R: OutputPin> RelayPort for HardwareAdapter<P, R> {
    fn set_relay(&mut self, relay: Relay, on: bool) {
        match relay {
            Relay::Run => self.run.set(on),
            Relay::Connect => self.connect.set(on),
        }
    }

    fn relay(&self, relay: Relay) -> bool {
        match relay {
            Relay::Run => self.run.is_on(),
            Relay::Connect => self.connect.is_on(),
        }
    }
}

// ── TimePort / WatchdogPort ───────────────────────────────────

impl<P: InputPin, R: OutputPin> TimePort for HardwareAdapter<P, R> {
    fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }

    fn wall_secs(&self) -> Option<u32> {
        self.time.wall_secs()
    }

    fn pause_ms(&mut self, ms: u32) {
        self.time.pause_ms(ms);
    }
}

impl<P: InputPin, R: OutputPin> WatchdogPort for HardwareAdapter<P, R> {
    fn feed(&mut self) {
        self.watchdog.feed();
    }

    fn reset_was_watchdog(&self) -> bool {
        self.watchdog.was_reset()
    }
}
