//! Relay drivers, watchdog, and one-shot peripheral setup.

pub mod hw_init;
pub mod relay;
pub mod watchdog;
