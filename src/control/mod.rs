//! Relay command layer.
//!
//! Owns nothing but timeouts; every side effect goes through the
//! [`relay::Cooperative`] owner passed into each call.

pub mod relay;
