//! In-memory sink for tests.
//!
//! Stores delivered artifacts in memory and supports one-shot forced
//! failures, so coordinator and fanout behavior around sink errors can be
//! exercised deterministically. Clones share the same underlying store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use silo_buffer::SealedArtifact;
use silo_core::{Offset, PartitionKey};

use crate::error::{SinkError, SinkResult};
use crate::sink::{ArtifactKey, Sink};

/// A delivered artifact as observed by the memory sink.
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    /// Partition the artifact came from.
    pub key: PartitionKey,
    /// First offset in the artifact.
    pub first_offset: Offset,
    /// Final (inclusive) offset in the artifact.
    pub final_offset: Offset,
    /// Number of records.
    pub record_count: u64,
    /// Hex MD5 of the payload.
    pub digest_hex: String,
    /// The encoded payload.
    pub payload: Bytes,
}

/// In-memory sink with one-shot fault injection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    saved: Arc<Mutex<Vec<SavedArtifact>>>,
    force_fail: Arc<AtomicBool>,
}

impl MemorySink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next save fail (one-shot).
    pub fn fail_next(&self) {
        self.force_fail.store(true, Ordering::SeqCst);
    }

    /// Returns the number of artifacts saved so far.
    ///
    /// # Panics
    /// Panics if the store mutex is poisoned.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saved.lock().expect("memory sink lock poisoned").len()
    }

    /// Returns a snapshot of the saved artifacts, in delivery order.
    ///
    /// # Panics
    /// Panics if the store mutex is poisoned.
    #[must_use]
    pub fn saved(&self) -> Vec<SavedArtifact> {
        self.saved
            .lock()
            .expect("memory sink lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, artifact: &SealedArtifact) -> SinkResult<()> {
        if self.force_fail.swap(false, Ordering::SeqCst) {
            return Err(SinkError::WriteFailed {
                sink: self.kind(),
                key: ArtifactKey::from_artifact(artifact).as_str().to_string(),
                message: "forced failure".to_string(),
            });
        }

        let saved = SavedArtifact {
            key: artifact.key().clone(),
            first_offset: artifact.first_offset(),
            final_offset: artifact.final_offset(),
            record_count: artifact.record_count(),
            digest_hex: artifact.digest().to_hex(),
            payload: artifact.payload(),
        };
        self.saved
            .lock()
            .expect("memory sink lock poisoned")
            .push(saved);
        Ok(())
    }
}
