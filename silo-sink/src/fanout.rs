//! Ordered delivery of one artifact to every configured sink.

use silo_buffer::SealedArtifact;
use tracing::{debug, info};

use crate::error::SinkResult;
use crate::sink::{ArtifactKey, Sink};

/// Delivers sealed artifacts to an ordered list of sinks.
///
/// Sinks are invoked one at a time, in construction order, each awaited
/// to completion before the next starts. The first failure propagates
/// immediately; there is no partial-success bookkeeping and no retry
/// here. A failed delivery must not advance the commit offset, so the
/// caller halts and the artifact is redelivered after restart.
pub struct SinkFanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkFanout {
    /// Creates a fanout over the given sinks. Order is preserved.
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Returns the number of configured sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sink is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Delivers `artifact` to every sink, in order.
    ///
    /// # Errors
    /// Propagates the first sink failure, leaving later sinks uncalled.
    pub async fn deliver(&self, artifact: &SealedArtifact) -> SinkResult<()> {
        let key = ArtifactKey::from_artifact(artifact);
        for sink in &self.sinks {
            debug!(sink = sink.kind(), key = %key, "delivering artifact");
            sink.save(artifact).await?;
        }
        info!(
            key = %key,
            records = artifact.record_count(),
            bytes = artifact.byte_size(),
            sinks = self.sinks.len(),
            "artifact delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use silo_buffer::PendingBatch;
    use silo_codec::Compression;
    use silo_core::{Offset, PartitionIndex, StreamRecord, Timestamp};

    use super::*;
    use crate::error::SinkError;
    use crate::memory::MemorySink;

    fn artifact() -> SealedArtifact {
        let record = StreamRecord {
            topic: "topic".to_string(),
            partition: PartitionIndex::new(0),
            offset: Offset::new(0),
            timestamp: Timestamp::from_millis(1_000),
            key: None,
            value: Some(Bytes::from_static(b"v")),
        };
        let mut batch = PendingBatch::new(&record, Compression::None);
        batch.append(&record).unwrap();
        batch.seal().unwrap()
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let fanout = SinkFanout::new(vec![Box::new(first.clone()), Box::new(second.clone())]);

        fanout.deliver(&artifact()).await.unwrap();
        assert_eq!(first.save_count(), 1);
        assert_eq!(second.save_count(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        first.fail_next();
        let fanout = SinkFanout::new(vec![Box::new(first.clone()), Box::new(second.clone())]);

        let result = fanout.deliver(&artifact()).await;
        assert!(matches!(result, Err(SinkError::WriteFailed { .. })));
        // The failing sink stored nothing and the later sink was never called.
        assert_eq!(first.save_count(), 0);
        assert_eq!(second.save_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_fanout_succeeds() {
        let fanout = SinkFanout::new(Vec::new());
        assert!(fanout.is_empty());
        fanout.deliver(&artifact()).await.unwrap();
    }
}
