//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the supervisory rules for the generator controller:
//! the controller loop, operator requests, and the status snapshot.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
