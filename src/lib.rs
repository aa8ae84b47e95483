//! GenCtl firmware library.
//!
//! Standby generator and automatic transfer switch supervisor.  Exposes
//! the pure-logic modules for integration testing and bench simulation.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod eventlog;
pub mod fsm;
pub mod persist;
pub mod scheduler;

pub mod pins;

// Hardware-facing modules; the real implementations are cfg-gated inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
