//! The ingest coordinator.

use std::time::Duration;

use silo_buffer::{BufferRegistry, PendingBatch, SealPolicy};
use silo_codec::Compression;
use silo_core::{limits, PartitionIndex, PartitionKey, StreamRecord, Timestamp};
use silo_sink::SinkFanout;
use tracing::{debug, info};

use crate::committer::OffsetCommitter;
use crate::error::{IngestError, IngestResult};
use crate::pacer::Pacer;

/// Routes stream events to per-partition buffers and drives the
/// seal → deliver → commit cycle.
///
/// The owning consumer loop is the sole caller of every entry point, and
/// each entry point runs to completion before the next is invoked, so no
/// locking exists anywhere in the pipeline. Sink delivery is awaited
/// inline: while an artifact is being saved, no further records are
/// drained for any partition. That is an intentional simplicity
/// trade-off, not a scalability target.
pub struct IngestCoordinator<C: OffsetCommitter> {
    registry: BufferRegistry,
    policy: SealPolicy,
    fanout: SinkFanout,
    committer: C,
    idle_pacer: Pacer,
}

impl<C: OffsetCommitter> IngestCoordinator<C> {
    /// Creates a coordinator with the default idle-check interval.
    #[must_use]
    pub fn new(policy: SealPolicy, compression: Compression, fanout: SinkFanout, committer: C) -> Self {
        Self {
            registry: BufferRegistry::new(compression),
            policy,
            fanout,
            committer,
            idle_pacer: Pacer::new(Duration::from_secs(
                limits::IDLE_CHECK_INTERVAL_SECS_DEFAULT,
            )),
        }
    }

    /// Sets the interval between idle sweeps.
    #[must_use]
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_pacer = Pacer::new(interval);
        self
    }

    /// Returns the number of open per-partition buffers.
    #[must_use]
    pub fn open_batches(&self) -> usize {
        self.registry.len()
    }

    /// Ingests one record.
    ///
    /// If appending the record would push the existing batch past its
    /// maximum logical age, that batch is sealed and delivered first and
    /// the record anchors a fresh batch. After the append, a batch that
    /// reached the size threshold is sealed and delivered immediately.
    ///
    /// # Errors
    /// - [`IngestError::MissingTimestamp`] if the record has no timestamp.
    /// - [`IngestError::Buffer`] on a non-contiguous offset.
    /// - [`IngestError::Sink`] / [`IngestError::Commit`] when a seal's
    ///   delivery or commit fails; the offset is not advanced and the
    ///   caller must halt.
    pub async fn on_record(&mut self, record: StreamRecord) -> IngestResult<()> {
        if record.timestamp.is_none() {
            return Err(IngestError::MissingTimestamp {
                topic: record.topic,
                partition: record.partition,
                offset: record.offset,
            });
        }

        let key = record.partition_key();

        let seal_first = self
            .registry
            .get_mut(&key)
            .is_some_and(|batch| self.policy.should_seal_before_append(batch, &record));
        if seal_first {
            if let Some(mut batch) = self.registry.remove(&key) {
                debug!(key = %key, "sealing batch before append: age limit reached");
                self.seal_and_deliver(&mut batch).await?;
            }
        }

        let batch = self.registry.get_or_create(&record);
        batch.append(&record)?;

        if self.policy.should_seal_after_append(batch) {
            if let Some(mut batch) = self.registry.remove(&key) {
                debug!(key = %key, "sealing batch after append: size limit reached");
                self.seal_and_deliver(&mut batch).await?;
            }
        }

        Ok(())
    }

    /// Evaluates the idle-seal rule across all open buffers, at most once
    /// per configured interval. Call freely from the consumer loop: on
    /// empty polls and between records alike.
    ///
    /// # Errors
    /// Propagates delivery and commit failures from idle-sealed batches.
    pub async fn on_idle_tick(&mut self) -> IngestResult<()> {
        if self.idle_pacer.ready() {
            self.seal_idle_batches(Timestamp::now()).await?;
        }
        Ok(())
    }

    /// Unpaced idle sweep against an explicit wall clock.
    ///
    /// The paced [`on_idle_tick`](Self::on_idle_tick) delegates here;
    /// tests drive it directly to control time. Qualifying batches are
    /// sealed and delivered in registry iteration order; partitions are
    /// independent, so cross-partition order carries no meaning.
    ///
    /// # Errors
    /// Propagates delivery and commit failures.
    pub async fn seal_idle_batches(&mut self, now: Timestamp) -> IngestResult<usize> {
        let idle: Vec<PartitionKey> = self
            .registry
            .iter()
            .filter(|(_, batch)| self.policy.should_seal_idle(batch, now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut sealed = 0;
        for key in idle {
            if let Some(mut batch) = self.registry.remove(&key) {
                debug!(key = %key, "sealing idle batch: partition exhausted past grace");
                self.seal_and_deliver(&mut batch).await?;
                sealed += 1;
            }
        }
        Ok(sealed)
    }

    /// Marks a partition as momentarily exhausted.
    ///
    /// No effect if the partition holds no open batch. The flag is
    /// cleared by the next appended record.
    pub fn on_eof(&mut self, topic: &str, partition: PartitionIndex) {
        let key = PartitionKey::new(topic, partition);
        if let Some(batch) = self.registry.get_mut(&key) {
            batch.mark_eof();
        }
    }

    /// Notification that partitions were assigned.
    ///
    /// A no-op: buffers are created lazily on the first record.
    pub fn on_partitions_assigned(&mut self, keys: &[PartitionKey]) {
        debug!(count = keys.len(), "partitions assigned");
    }

    /// Notification that partitions were revoked.
    ///
    /// Open and undelivered buffers for the revoked partitions are
    /// discarded without sealing or committing: their offsets were never
    /// committed, so the new assignee replays the same records.
    pub fn on_partitions_revoked(&mut self, keys: &[PartitionKey]) {
        let discarded = self.registry.revoke_all(keys);
        if discarded > 0 {
            info!(revoked = keys.len(), discarded, "discarded buffers on revocation");
        }
    }

    /// Seals `batch`, delivers the artifact to every sink, then commits
    /// the offset. The batch has already been detached from the registry;
    /// on success the partition is back to having no buffer.
    async fn seal_and_deliver(&self, batch: &mut PendingBatch) -> IngestResult<()> {
        let artifact = batch.seal()?;

        self.fanout.deliver(&artifact).await?;

        let key = artifact.key();
        self.committer.commit_next_offset(
            &key.topic,
            key.partition,
            artifact.commit_next_offset(),
        )?;
        info!(
            key = %key,
            first_offset = artifact.first_offset().get(),
            committed_next = artifact.commit_next_offset().get(),
            "offset committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use silo_core::Offset;
    use silo_sink::MemorySink;

    use super::*;
    use crate::committer::RecordingCommitter;

    fn record(partition: i32, offset: i64, timestamp_ms: i64) -> StreamRecord {
        StreamRecord {
            topic: "topic".to_string(),
            partition: PartitionIndex::new(partition),
            offset: Offset::new(offset),
            timestamp: Timestamp::from_millis(timestamp_ms),
            key: None,
            value: Some(Bytes::from_static(b"value")),
        }
    }

    fn coordinator(
        policy: SealPolicy,
    ) -> (IngestCoordinator<RecordingCommitter>, MemorySink, RecordingCommitter) {
        let sink = MemorySink::new();
        let committer = RecordingCommitter::new();
        let fanout = SinkFanout::new(vec![Box::new(sink.clone())]);
        let coordinator =
            IngestCoordinator::new(policy, Compression::None, fanout, committer.clone());
        (coordinator, sink, committer)
    }

    #[tokio::test]
    async fn test_missing_timestamp_rejected() {
        let (mut coordinator, sink, committer) = coordinator(SealPolicy::default());

        let mut bad = record(0, 0, 0);
        bad.timestamp = Timestamp::none();
        let result = coordinator.on_record(bad).await;

        assert!(matches!(result, Err(IngestError::MissingTimestamp { .. })));
        assert_eq!(sink.save_count(), 0);
        assert!(committer.commits().is_empty());
        assert_eq!(coordinator.open_batches(), 0);
    }

    #[tokio::test]
    async fn test_eof_without_buffer_is_noop() {
        let (mut coordinator, _, _) = coordinator(SealPolicy::default());
        coordinator.on_eof("topic", PartitionIndex::new(9));
        assert_eq!(coordinator.open_batches(), 0);
    }

    #[tokio::test]
    async fn test_assignment_is_noop() {
        let (mut coordinator, _, _) = coordinator(SealPolicy::default());
        coordinator
            .on_partitions_assigned(&[PartitionKey::new("topic", PartitionIndex::new(0))]);
        assert_eq!(coordinator.open_batches(), 0);
    }

    #[tokio::test]
    async fn test_contiguity_fault_propagates() {
        let (mut coordinator, _, _) = coordinator(SealPolicy::default());
        coordinator.on_record(record(0, 10, 1_000)).await.unwrap();

        let result = coordinator.on_record(record(0, 12, 1_001)).await;
        assert!(matches!(result, Err(IngestError::Buffer(_))));
    }
}
