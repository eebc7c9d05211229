//! Error types for relaysync.

use thiserror::Error;

/// Run-level failures. Any of these aborts the current reconciliation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network failure or non-2xx status after the retry budget was spent
    #[error("Transport error: {0}")]
    Transport(String),

    /// A source feed body did not have the declared shape
    #[error("Format error: {0}")]
    Format(String),

    /// The list store rejected a request or answered with a malformed envelope
    #[error("List store error: {0}")]
    Store(String),

    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a single raw entry was dropped during normalization.
///
/// These never abort a run; they are counted and logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty entry")]
    Empty,

    #[error("invalid prefix '{0}'")]
    InvalidPrefix(String),

    #[error("unrecognized address '{0}'")]
    UnrecognizedAddress(String),

    #[error("{family} prefix /{prefix} outside [{min}, {max}]")]
    PrefixOutOfRange {
        family: &'static str,
        prefix: u32,
        min: u32,
        max: u32,
    },

    #[error("IPv6 address '{0}' has no prefix and promotion to /64 is disabled")]
    MissingIpv6Prefix(String),
}

impl ValidationError {
    /// Stable label used to bucket dropped entries.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Empty => "empty",
            ValidationError::InvalidPrefix(_) => "invalid_prefix",
            ValidationError::UnrecognizedAddress(_) => "unrecognized_address",
            ValidationError::PrefixOutOfRange { .. } => "prefix_out_of_range",
            ValidationError::MissingIpv6Prefix(_) => "missing_ipv6_prefix",
        }
    }
}
