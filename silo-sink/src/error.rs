//! Sink error types.

use thiserror::Error;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that can occur while saving an artifact.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A sink's save operation failed. The commit offset must not advance
    /// past the artifact; the caller halts and the artifact is redelivered
    /// after restart.
    #[error("{sink} write failed for {key}: {message}")]
    WriteFailed {
        /// Which sink failed.
        sink: &'static str,
        /// Destination key of the artifact.
        key: String,
        /// Error message.
        message: String,
    },

    /// Sink configuration is invalid.
    #[error("invalid sink configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration is invalid.
        reason: String,
    },

    /// I/O error outside a save operation (setup, schema creation).
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl SinkError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }
}
