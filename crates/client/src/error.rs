//! Error types for the packet builders

use flowd_protocol::ProtocolError;
use thiserror::Error;

/// Result type for builder operations
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Errors that can occur when building datagrams
#[derive(Debug, Error)]
pub enum BuilderError {
    /// More records than a v5 datagram can carry
    #[error("too many flows: {count} exceeds maximum {max}")]
    TooManyFlows {
        /// Records added
        count: usize,
        /// Maximum per datagram
        max: usize,
    },

    /// Encoding failed
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}
