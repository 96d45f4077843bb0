//! Common error types for wilc-link.
//!
//! This module provides a centralized Error enum using thiserror,
//! with conversions from underlying error types used throughout the crate.
//!
//! The vendor shim this replaces collapsed every fault into one byte code.
//! Callers that only care about pass/fail can keep treating any `Err` that
//! way; the variants exist so tests and logs can tell a stuck bus from a
//! caller mistake.

use thiserror::Error;

use crate::transport::{BusKind, IoctlKind};

/// Main error type for wilc-link operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Faults reported by the bus peripheral
    #[error("Bus error: {0}")]
    Bus(String),

    /// Transaction larger than the transport can carry
    #[error("transaction of {requested} bytes exceeds the {max}-byte transport limit")]
    SizeExceeded { requested: usize, max: usize },

    /// Bounded wait on a peripheral flag expired
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Ioctl command not served by the active bus
    #[error("{bus} transport does not serve {cmd} requests")]
    UnsupportedCommand { bus: BusKind, cmd: IoctlKind },

    /// Malformed transaction request (mismatched or missing buffers)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
