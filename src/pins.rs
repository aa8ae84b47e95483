//! GPIO / peripheral pin assignments for the controller board.
//!
//! Single source of truth.  `main` claims the GPIOs listed here and the
//! ADC driver configures the channels listed here.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH through ULN2003 drivers)
// ---------------------------------------------------------------------------

/// Generator remote start/run contact.
pub const RUN_RELAY_GPIO: i32 = 1;
/// Transfer switch "connect to generator" request.
pub const CONNECT_RELAY_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Opto-isolated inputs (active LOW, external pull-ups)
// ---------------------------------------------------------------------------

/// Utility mains present at the transfer switch line side.
pub const UTILITY_PRESENT_GPIO: i32 = 10;
/// Generator output present.
pub const GENERATOR_PRESENT_GPIO: i32 = 11;
/// Transfer switch auxiliary contact: load on utility.
pub const ON_UTILITY_GPIO: i32 = 12;
/// Transfer switch auxiliary contact: load on generator.
pub const ON_GENERATOR_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Analog inputs (ADC1)
// ---------------------------------------------------------------------------

/// Starter battery divider.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const BATTERY_ADC_CHANNEL: u32 = 4;
/// Load current transformer.  ADC1 channel 5 (GPIO 6 on ESP32-S3).
pub const LOAD_CURRENT_ADC_CHANNEL: u32 = 5;

// ---------------------------------------------------------------------------
// Loop timing
// ---------------------------------------------------------------------------

/// Pause between control ticks.
pub const CONTROL_TICK_MS: u32 = 100;
