//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (inputs, relays, clock, watchdog, storage, the operator
//! surface) implement these traits.  The [`Controller`](super::service::Controller)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Ownership rules
//!
//! - Only the controller drives a [`RelayPort`].  The [`OperatorPort`] sees a
//!   read-only [`StatusSnapshot`] and may enqueue requests on the
//!   [`RequestDesk`]; it never commands a relay.
//! - All port errors are typed; callers must handle every variant explicitly.

use super::commands::RequestDesk;
use super::events::{NotifyKind, StatusSnapshot};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One raw read of the four opto-isolated position/power inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawInputs {
    pub utility_present: bool,
    pub generator_present: bool,
    pub on_utility: bool,
    pub on_generator: bool,
}

/// Read-side port: the domain calls this to obtain raw sensor data.
/// Debouncing and hysteresis happen in the domain, not here.
pub trait SensorPort {
    fn read_inputs(&mut self) -> RawInputs;

    /// Starter battery voltage, already scaled to volts.
    fn battery_volts(&mut self) -> f32;

    /// Load current on the generator feed, already scaled to amps.
    fn load_amps(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The two controller-owned relay outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// Closes the generator's remote start/run contact.
    Run,
    /// Asks the transfer switch to move the load to the generator.
    Connect,
}

/// Write-side port: the domain calls this to energise relays.
pub trait RelayPort {
    fn set_relay(&mut self, relay: Relay, on: bool);

    /// Last commanded state of a relay.
    fn relay(&self, relay: Relay) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic time, wall-clock time, and the short pause used between
/// polls of a bounded wait.
pub trait TimePort {
    /// Milliseconds since boot (monotonic).
    fn now_ms(&self) -> u64;

    /// Seconds since the Unix epoch, `None` until the clock has been set.
    fn wall_secs(&self) -> Option<u32>;

    /// Sleep for a few milliseconds.  Never called with more than one
    /// poll interval, so the watchdog is always fed in time.
    fn pause_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Watchdog port
// ───────────────────────────────────────────────────────────────

pub trait WatchdogPort {
    /// Push the hardware reset deadline out by one watchdog period.
    fn feed(&mut self);

    /// True if the last reset was forced by the watchdog.
    fn reset_was_watchdog(&self) -> bool;
}

/// Everything the controller needs from the board, as one bound.
///
/// Sensors and relays live on the same adapter, which avoids a double
/// mutable borrow while keeping each port boundary explicit.
pub trait Board: SensorPort + RelayPort + TimePort + WatchdogPort {}

impl<T: SensorPort + RelayPort + TimePort + WatchdogPort> Board for T {}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the config record and event log.
///
/// Write operations MUST be atomic: no partial writes on power loss.
/// The ESP-IDF NVS API guarantees this natively; in-memory simulation
/// achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Usable size of the backing store in bytes.  The event log is
    /// sized from this.
    fn capacity_bytes(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Operator port (display, web server, notifier)
// ───────────────────────────────────────────────────────────────

/// The network/UI collaborator.
///
/// Serviced once per cooperative step.  `service` must return quickly:
/// it is called from inside every bounded wait, including relay waits.
pub trait OperatorPort {
    /// Make incremental progress.  May read `status` and queue override
    /// intents or config updates on `desk`.
    fn service(&mut self, status: &StatusSnapshot, desk: &mut RequestDesk);

    /// Fire-and-forget notification request.  Delivery is not retried by
    /// the controller.
    fn notify(&mut self, kind: NotifyKind);

    /// Power is back on the load.  Presentation state can be reset.
    fn power_switched(&mut self, at_ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from config validation and loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed its tag check or did not decode.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The update queue is full.
    Busy,
    /// The config could not be persisted.
    Storage(StorageError),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// A record did not serialize or deserialize.
    Codec,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Busy => write!(f, "update queue full"),
            Self::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Codec => write!(f, "record encoding error"),
        }
    }
}
