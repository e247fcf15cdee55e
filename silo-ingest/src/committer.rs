//! The offset-commit capability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use silo_core::{Offset, PartitionIndex};
use thiserror::Error;

/// An offset commit failed.
#[derive(Debug, Error)]
#[error("offset commit failed for {topic}/{partition} at {next_offset}: {message}")]
pub struct CommitError {
    /// Topic of the failed commit.
    pub topic: String,
    /// Partition of the failed commit.
    pub partition: PartitionIndex,
    /// Offset that was being committed.
    pub next_offset: Offset,
    /// Error message from the stream source.
    pub message: String,
}

/// Capability to advance the stream source's committed offset.
///
/// The coordinator invokes this exactly once per delivered artifact, with
/// `next_offset` one past the artifact's final offset. For a given
/// partition, commits are issued in strictly increasing offset order.
pub trait OffsetCommitter {
    /// Commits `next_offset` as the next offset to consume for the
    /// partition.
    ///
    /// # Errors
    /// Returns an error if the source rejects the commit.
    fn commit_next_offset(
        &self,
        topic: &str,
        partition: PartitionIndex,
        next_offset: Offset,
    ) -> Result<(), CommitError>;
}

/// Committer that records commits in memory, for tests.
///
/// Clones share the same record. Supports one-shot forced failure.
#[derive(Debug, Clone, Default)]
pub struct RecordingCommitter {
    commits: Arc<Mutex<Vec<(String, PartitionIndex, Offset)>>>,
    force_fail: Arc<AtomicBool>,
}

impl RecordingCommitter {
    /// Creates an empty recording committer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail (one-shot).
    pub fn fail_next(&self) {
        self.force_fail.store(true, Ordering::SeqCst);
    }

    /// Returns the recorded commits in order.
    ///
    /// # Panics
    /// Panics if the record mutex is poisoned.
    #[must_use]
    pub fn commits(&self) -> Vec<(String, PartitionIndex, Offset)> {
        self.commits.lock().expect("commit lock poisoned").clone()
    }
}

impl OffsetCommitter for RecordingCommitter {
    fn commit_next_offset(
        &self,
        topic: &str,
        partition: PartitionIndex,
        next_offset: Offset,
    ) -> Result<(), CommitError> {
        if self.force_fail.swap(false, Ordering::SeqCst) {
            return Err(CommitError {
                topic: topic.to_string(),
                partition,
                next_offset,
                message: "forced failure".to_string(),
            });
        }
        self.commits
            .lock()
            .expect("commit lock poisoned")
            .push((topic.to_string(), partition, next_offset));
        Ok(())
    }
}
