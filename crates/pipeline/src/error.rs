//! Pipeline error types
//!
//! Error types for the buffer dispatcher.

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Dispatcher configured without workers
    #[error("dispatcher requires at least one worker")]
    InvalidWorkerCount,

    /// `run` was called more than once
    #[error("dispatcher is already running")]
    AlreadyRunning,

    /// Dispatcher is stopping or stopped; the job was not accepted
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::InvalidWorkerCount;
        assert!(err.to_string().contains("at least one worker"));

        let err = PipelineError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = PipelineError::ShuttingDown;
        assert!(err.to_string().contains("shutting down"));
    }
}
