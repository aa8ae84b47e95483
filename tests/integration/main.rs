//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the full controller
//! against the simulated board, a scripted operator, and the in-memory
//! NVS backend.  All tests run on the host with virtual time, so
//! multi-hour outage cycles finish in well under a second of wall time.

#![cfg(not(target_os = "espidf"))]

mod exercise_tests;
mod outage_tests;
mod override_tests;
mod persistence_tests;
mod sim_rig;
