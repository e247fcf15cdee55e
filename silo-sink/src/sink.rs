//! The sink capability and artifact key layout.

use async_trait::async_trait;
use silo_buffer::SealedArtifact;

use crate::error::SinkResult;

/// Destination key of an artifact within a sink.
///
/// Keys follow the layout `{topic}/{partition:06}/{first_offset:020}`:
/// zero-padding keeps lexicographic order equal to numeric order, so
/// object listings come back in partition/offset order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Creates a key from a raw string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates the key for an artifact.
    #[must_use]
    pub fn from_artifact(artifact: &SealedArtifact) -> Self {
        let key = artifact.key();
        Self(format!(
            "{}/{:06}/{:020}",
            key.topic,
            key.partition.get(),
            artifact.first_offset().get()
        ))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable destination for sealed artifacts.
///
/// One operation: save. Implementations apply their own timeout and retry
/// policy internally or fail; the caller never retries. `save` is called
/// with the same artifact more than once across process restarts, so
/// implementations must be idempotent on the artifact's offset range.
/// The artifact is borrowed for the duration of the call only; sinks must
/// not retain the payload handle beyond it.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name of the sink backend, for logs and errors.
    fn kind(&self) -> &'static str;

    /// Durably saves one artifact.
    ///
    /// # Errors
    /// Returns [`crate::SinkError::WriteFailed`] on any failure.
    async fn save(&self, artifact: &SealedArtifact) -> SinkResult<()>;
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use silo_buffer::PendingBatch;
    use silo_codec::Compression;
    use silo_core::{Offset, PartitionIndex, StreamRecord, Timestamp};

    use super::*;

    #[test]
    fn test_key_layout_zero_pads() {
        let record = StreamRecord {
            topic: "events".to_string(),
            partition: PartitionIndex::new(3),
            offset: Offset::new(1_234),
            timestamp: Timestamp::from_millis(1_000),
            key: None,
            value: Some(Bytes::from_static(b"v")),
        };
        let mut batch = PendingBatch::new(&record, Compression::None);
        batch.append(&record).unwrap();
        let artifact = batch.seal().unwrap();

        let key = ArtifactKey::from_artifact(&artifact);
        assert_eq!(key.as_str(), "events/000003/00000000000000001234");
    }
}
