//! Protocol error types
//!
//! Errors that can occur when parsing or encoding NetFlow v5 datagrams.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Datagram is too short to contain the fixed header or a record
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Header version field is not 5
    #[error("unsupported netflow version: {0}")]
    UnsupportedVersion(u16),

    /// Declared (or supplied) flow count exceeds the v5 maximum
    #[error("too many flows: {count} (max {max})")]
    TooManyFlows { count: usize, max: usize },

    /// Datagram is shorter than the length implied by its flow count
    #[error("truncated packet: {count} flows need {expected} bytes, got {actual}")]
    Truncated {
        count: usize,
        expected: usize,
        actual: usize,
    },
}

impl ProtocolError {
    /// Create a message too short error
    #[inline]
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::TooShort { expected, actual }
    }

    /// Create a too many flows error
    #[inline]
    pub fn too_many_flows(count: usize) -> Self {
        Self::TooManyFlows {
            count,
            max: crate::netflow5::MAX_FLOWS,
        }
    }

    /// True when the datagram is well-formed but not NetFlow v5
    ///
    /// Receivers usually share a port with unrelated exporters, so this case
    /// is accounted separately from genuinely malformed input.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::UnsupportedVersion(_))
    }
}
