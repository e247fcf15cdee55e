//! Silo Ingest - The coordination layer between stream and sinks.
//!
//! The [`IngestCoordinator`] is driven by the owning consumer loop: every
//! record, end-of-partition marker, idle tick, and rebalance notification
//! flows through it. It routes records to per-partition buffers, applies
//! the sealing policy, delivers sealed artifacts through the sink fanout,
//! and commits the consumption offset only after every sink accepted.
//!
//! # Per-partition lifecycle
//!
//! ```text
//! ABSENT --first record--> OPEN --seal--> SEALED --deliver+commit--> ABSENT
//!                           |                                          ^
//!                           +-------------- revocation ----------------+
//! ```
//!
//! Sealing is transient: the coordinator takes the buffer out of the
//! registry, seals it, and either completes delivery and commit or
//! surfaces the error to the loop, which halts. There is no path that
//! re-opens a sealed batch and no internal retry; restart replays from
//! the last committed offset.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod committer;
mod coordinator;
mod error;
mod pacer;

pub use committer::{CommitError, OffsetCommitter, RecordingCommitter};
pub use coordinator::IngestCoordinator;
pub use error::{IngestError, IngestResult};
pub use pacer::Pacer;
