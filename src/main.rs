//! GenCtl Firmware: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter            LogCollaborator     NvsAdapter     │
//! │  (Sensor+Relay+Time+WDT)    (OperatorPort)      (StoragePort)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Outage FSM · RelayController · ExerciseScheduler      │    │
//! │  │  SignalSet · EventLog · ConfigStore                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::gpio::{InputPin, OutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use log::{error, info};

use genctl::adapters::hardware::HardwareAdapter;
use genctl::adapters::log_sink::LogCollaborator;
use genctl::adapters::nvs::NvsAdapter;
use genctl::adapters::time::Esp32TimeAdapter;
use genctl::app::ports::TimePort;
use genctl::app::service::Controller;
use genctl::drivers::relay::RelayDriver;
use genctl::error::Error;
use genctl::drivers::watchdog::Watchdog;
use genctl::pins;
use genctl::sensors::analog::AnalogChannel;
use genctl::sensors::{OptoInputs, SensorHub};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  GenCtl v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = genctl::drivers::hw_init::init_peripherals() {
        // Without the ADC there is no battery check; relays still work.
        error!("HAL init failed: {}", e);
    }
    let watchdog = Watchdog::new();
    let p = Peripherals::take()?;

    // GPIO numbers must match `pins`.
    let optos = OptoInputs {
        utility_present: PinDriver::input(p.pins.gpio10.downgrade_input())?,
        generator_present: PinDriver::input(p.pins.gpio11.downgrade_input())?,
        on_utility: PinDriver::input(p.pins.gpio12.downgrade_input())?,
        on_generator: PinDriver::input(p.pins.gpio13.downgrade_input())?,
    };
    let run = RelayDriver::new(PinDriver::output(p.pins.gpio1.downgrade_output())?, "run");
    let connect = RelayDriver::new(
        PinDriver::output(p.pins.gpio2.downgrade_output())?,
        "connect",
    );
    let sensor_hub = SensorHub::new(
        optos,
        AnalogChannel::battery(pins::BATTERY_ADC_CHANNEL),
        AnalogChannel::load_current(pins::LOAD_CURRENT_ADC_CHANNEL),
    );
    let hw = HardwareAdapter::new(sensor_hub, run, connect, Esp32TimeAdapter::new(), watchdog);

    // ── 3. Storage ────────────────────────────────────────────
    // A failed init returns from main; the panic handler reboots.
    let nvs = NvsAdapter::new().map_err(Error::from)?;

    // ── 4. Boot the controller ────────────────────────────────
    let mut ctl = Controller::boot(hw, nvs, LogCollaborator::new());
    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        ctl.tick();
        ctl.board_mut().pause_ms(pins::CONTROL_TICK_MS);
    }
}
