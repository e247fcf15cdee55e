//! Kafka consumer loop driving the ingest coordinator.
//!
//! The loop owns the consumer and is the sole caller of every coordinator
//! entry point. Rebalance notifications arrive on the same thread inside
//! `poll`, so the consumer context queues them and the loop forwards the
//! queue to the coordinator before handling the next event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::topic_partition_list::{Offset as KafkaOffset, TopicPartitionList};
use rdkafka::ClientContext;
use silo_core::{Offset, PartitionIndex, PartitionKey, StreamRecord, Timestamp};
use silo_ingest::{CommitError, IngestCoordinator, IngestError, OffsetCommitter};
use silo_sink::SinkError;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that terminate the archiver.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Kafka client error.
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Sink construction or write error.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Ingest pipeline error.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration is invalid.
        reason: String,
    },
}

/// A rebalance observed by the consumer context.
#[derive(Debug)]
enum RebalanceEvent {
    Assigned(Vec<PartitionKey>),
    Revoked(Vec<PartitionKey>),
}

/// Consumer context that queues rebalance notifications for the loop.
#[derive(Clone, Default)]
pub struct ArchiveContext {
    events: Arc<Mutex<Vec<RebalanceEvent>>>,
}

impl ArchiveContext {
    fn drain(&self) -> Vec<RebalanceEvent> {
        std::mem::take(&mut *self.events.lock().expect("rebalance queue poisoned"))
    }

    fn push(&self, event: RebalanceEvent) {
        self.events
            .lock()
            .expect("rebalance queue poisoned")
            .push(event);
    }
}

fn partition_keys(tpl: &TopicPartitionList) -> Vec<PartitionKey> {
    tpl.elements()
        .iter()
        .map(|elem| PartitionKey::new(elem.topic(), PartitionIndex::new(elem.partition())))
        .collect()
}

impl ClientContext for ArchiveContext {}

impl ConsumerContext for ArchiveContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Revoke(tpl) => {
                let keys = partition_keys(tpl);
                info!(partitions = keys.len(), "partitions revoked");
                self.push(RebalanceEvent::Revoked(keys));
            }
            Rebalance::Assign(_) => {}
            Rebalance::Error(e) => warn!(error = %e, "rebalance error"),
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(tpl) = rebalance {
            let keys = partition_keys(tpl);
            info!(partitions = keys.len(), "partitions assigned");
            self.push(RebalanceEvent::Assigned(keys));
        }
    }
}

/// The consumer type used by the archiver.
pub type ArchiveConsumer = BaseConsumer<ArchiveContext>;

/// Commits offsets synchronously through the consumer.
#[derive(Clone)]
pub struct KafkaCommitter {
    consumer: Arc<ArchiveConsumer>,
}

impl OffsetCommitter for KafkaCommitter {
    fn commit_next_offset(
        &self,
        topic: &str,
        partition: PartitionIndex,
        next_offset: Offset,
    ) -> Result<(), CommitError> {
        let commit_error = |message: String| CommitError {
            topic: topic.to_string(),
            partition,
            next_offset,
            message,
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition.get(), KafkaOffset::Offset(next_offset.get()))
            .map_err(|e| commit_error(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| commit_error(e.to_string()))
    }
}

/// Builds the subscribed consumer and its offset committer.
///
/// Auto-commit is disabled: the coordinator is the only thing that ever
/// advances offsets, and only after sink delivery. Partition EOF events
/// are enabled because they feed the idle-seal trigger.
///
/// # Errors
/// Returns an error if the consumer cannot be created or subscribed.
pub fn build_consumer(
    brokers: &str,
    group: &str,
    topic: &str,
    offset_reset: &str,
) -> Result<(Arc<ArchiveConsumer>, KafkaCommitter), ServerError> {
    let consumer: ArchiveConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group)
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "true")
        .set("auto.offset.reset", offset_reset)
        .set("queued.max.messages.kbytes", "10240")
        .create_with_context(ArchiveContext::default())?;

    consumer.subscribe(&[topic])?;

    let consumer = Arc::new(consumer);
    let committer = KafkaCommitter {
        consumer: Arc::clone(&consumer),
    };
    Ok((consumer, committer))
}

/// Converts a consumed message into a [`StreamRecord`].
fn to_stream_record(message: &rdkafka::message::BorrowedMessage<'_>) -> StreamRecord {
    let timestamp = message
        .timestamp()
        .to_millis()
        .map_or_else(Timestamp::none, Timestamp::from_millis);

    StreamRecord {
        topic: message.topic().to_string(),
        partition: PartitionIndex::new(message.partition()),
        offset: Offset::new(message.offset()),
        timestamp,
        key: message.key().map(Bytes::copy_from_slice),
        value: message.payload().map(Bytes::copy_from_slice),
    }
}

/// Drives the coordinator until a fatal error.
///
/// Poll timeouts double as idle ticks; the coordinator paces the actual
/// sweep internally. Transient transport errors are logged and retried by
/// the client library; ingest errors are fatal, and restart replays from
/// the last committed offset.
///
/// # Errors
/// Returns the first fatal ingest error.
pub async fn run_loop(
    consumer: &Arc<ArchiveConsumer>,
    mut coordinator: IngestCoordinator<KafkaCommitter>,
    topic: &str,
) -> Result<(), ServerError> {
    loop {
        for event in consumer.context().drain() {
            match event {
                RebalanceEvent::Assigned(keys) => coordinator.on_partitions_assigned(&keys),
                RebalanceEvent::Revoked(keys) => coordinator.on_partitions_revoked(&keys),
            }
        }

        match consumer.poll(Duration::from_secs(1)) {
            None => {}
            Some(Ok(message)) => {
                let record = to_stream_record(&message);
                coordinator.on_record(record).await?;
            }
            Some(Err(KafkaError::PartitionEOF(partition))) => {
                coordinator.on_eof(topic, PartitionIndex::new(partition));
            }
            Some(Err(e)) => {
                // The client library recovers transient transport faults
                // itself; anything it resurfaces here is logged and polled
                // again.
                warn!(error = %e, "consumer poll error");
            }
        }

        coordinator.on_idle_tick().await?;
    }
}
