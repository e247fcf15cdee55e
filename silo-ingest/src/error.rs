//! Ingest error types.

use silo_buffer::BufferError;
use silo_core::{Offset, PartitionIndex};
use silo_sink::SinkError;
use thiserror::Error;

use crate::committer::CommitError;

/// Result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors surfaced by the ingest coordinator.
///
/// None of these are retried internally. The consumer loop decides
/// halt-vs-log; every variant here breaks the archive's correctness
/// guarantee if ignored, so the loop halts on all of them.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The record carries no timestamp. Timestamps are the sole basis for
    /// age-based sealing and cannot be synthesized safely.
    #[error(
        "record at {topic}/{partition} offset {offset} has no timestamp; \
         age-based sealing requires source timestamps"
    )]
    MissingTimestamp {
        /// Topic of the offending record.
        topic: String,
        /// Partition of the offending record.
        partition: PartitionIndex,
        /// Offset of the offending record.
        offset: Offset,
    },

    /// Buffer-level fault (non-contiguous offset, sealed-batch misuse).
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A sink refused the artifact; the offset was not committed.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The offset commit itself failed after successful delivery.
    #[error(transparent)]
    Commit(#[from] CommitError),
}
