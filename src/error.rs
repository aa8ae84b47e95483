//! Unified error types for the generator controller.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! supervisory loop handles failures uniformly.  All variants are `Copy`
//! so they pass through the state machine and the event log without
//! allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A relay command did not complete.
    Relay(RelayFault),
    /// Durable storage could not be read or written.
    Storage(StorageError),
    /// A configuration value was rejected.
    Config(ConfigError),
    /// An internal assertion failed.  Not recoverable without a restart.
    Invariant(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Invariant(msg) => write!(f, "invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Relay faults
// ---------------------------------------------------------------------------

/// The four timed relay commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOp {
    StartGenerator,
    StopGenerator,
    ConnectToGenerator,
    ConnectToUtility,
}

impl fmt::Display for RelayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartGenerator => write!(f, "start generator"),
            Self::StopGenerator => write!(f, "stop generator"),
            Self::ConnectToGenerator => write!(f, "connect to generator"),
            Self::ConnectToUtility => write!(f, "connect to utility"),
        }
    }
}

/// Why a relay command failed.  Success is `Ok(())`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFault {
    /// The generator or switch did not respond inside its window.
    Timeout(RelayOp),
    /// Asked to connect to a source the sensors report as unpowered.
    PreconditionViolated(RelayOp),
}

impl RelayFault {
    pub fn op(self) -> RelayOp {
        match self {
            Self::Timeout(op) | Self::PreconditionViolated(op) => op,
        }
    }
}

impl fmt::Display for RelayFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(op) => write!(f, "{op} timed out"),
            Self::PreconditionViolated(op) => write!(f, "{op} refused: source not powered"),
        }
    }
}

impl From<RelayFault> for Error {
    fn from(e: RelayFault) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
