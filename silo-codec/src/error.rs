//! Codec error types.
//!
//! All errors are explicit and typed. No string errors.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a container.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Container header is missing, malformed, or carries the wrong magic.
    #[error("invalid container header: {reason}")]
    InvalidHeader {
        /// Why the header is invalid.
        reason: &'static str,
    },

    /// Container was written by an unknown format version.
    #[error("unsupported container version: {version}")]
    UnsupportedVersion {
        /// The version found in the header.
        version: u32,
    },

    /// Compression byte does not name a known codec.
    #[error("unsupported compression codec: {byte:#04x}")]
    UnsupportedCompression {
        /// The raw compression byte.
        byte: u8,
    },

    /// A frame body exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes exceeds max {max} bytes")]
    FrameTooLarge {
        /// Actual body size in bytes.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Frame data ends before the declared length.
    #[error("truncated frame at offset {offset}: expected {expected} bytes, found {found} bytes")]
    TruncatedFrame {
        /// Byte offset of the frame within the container.
        offset: u64,
        /// Declared body length.
        expected: u64,
        /// Bytes actually available.
        found: u64,
    },

    /// Compression or decompression failed.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl CodecError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }
}
