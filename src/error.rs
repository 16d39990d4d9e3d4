//! Error types for the monitoring engine
//!
//! Probe failures are not errors at this level: they are classified into
//! [`ProbeErrorKind`] and carried inside probe results so they never escape
//! the handling of a single link.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure class of a single probe (reachability or health query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    Unreachable,
    ProtocolError,
    /// Health query rejected the credentials (SNMP community mismatch).
    AuthError,
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "probe timeout",
            Self::Unreachable => "unreachable",
            Self::ProtocolError => "protocol error",
            Self::AuthError => "authentication rejected",
        };
        f.write_str(label)
    }
}

/// Errors that cross component boundaries.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("status store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),

    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
