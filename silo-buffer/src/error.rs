//! Buffer error types.

use silo_codec::CodecError;
use silo_core::{Offset, PartitionKey};
use thiserror::Error;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur while accumulating or sealing a batch.
#[derive(Debug, Error)]
pub enum BufferError {
    /// An appended record's offset does not follow the expected next
    /// offset. Fatal: indicates duplicate delivery or an offset reset
    /// upstream, either of which breaks the archive's correctness
    /// guarantee. Processing of the affected stream must halt.
    #[error("non-contiguous offset for {key}: expected {expected}, got {actual}")]
    NonContiguous {
        /// Partition whose batch detected the fault.
        key: PartitionKey,
        /// Offset the batch expected next.
        expected: Offset,
        /// Offset actually delivered.
        actual: Offset,
    },

    /// The batch is already sealed. Sealing twice or appending after a
    /// seal is a programming defect, surfaced as a typed error so the
    /// caller chooses halt-vs-log policy.
    #[error("batch for {key} is already sealed")]
    AlreadySealed {
        /// Partition whose batch was mutated after sealing.
        key: PartitionKey,
    },

    /// Encoding a record into the container failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
