//! Pending batches and sealed artifacts.

use bytes::Bytes;
use silo_codec::{BatchWriter, Compression, Digest};
use silo_core::{Offset, PartitionKey, StreamRecord, Timestamp};

use crate::error::{BufferError, BufferResult};

/// Per-partition accumulator for an in-progress batch.
///
/// Anchored at its first record: that record's offset and timestamp fix
/// the batch's offset range start and the reference point for the age
/// trigger. Records append in strict offset order; sealing converts the
/// accumulated container into an immutable [`SealedArtifact`].
#[derive(Debug)]
pub struct PendingBatch {
    key: PartitionKey,
    first_offset: Offset,
    next_offset: Offset,
    first_timestamp: Timestamp,
    count: u64,
    byte_size: u64,
    saw_eof: bool,
    writer: Option<BatchWriter>,
}

impl PendingBatch {
    /// Creates a batch anchored at `first`, without appending it.
    ///
    /// The caller appends the anchor record immediately after creation;
    /// the two steps are separate so append errors surface uniformly.
    #[must_use]
    pub fn new(first: &StreamRecord, compression: Compression) -> Self {
        let writer = BatchWriter::new(compression);
        let byte_size = writer.byte_size();
        Self {
            key: first.partition_key(),
            first_offset: first.offset,
            next_offset: first.offset,
            first_timestamp: first.timestamp,
            count: 0,
            byte_size,
            saw_eof: false,
            writer: Some(writer),
        }
    }

    /// Returns the partition this batch belongs to.
    #[must_use]
    pub const fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Returns the offset of the first record.
    #[must_use]
    pub const fn first_offset(&self) -> Offset {
        self.first_offset
    }

    /// Returns the offset the next appended record must carry.
    #[must_use]
    pub const fn expected_next_offset(&self) -> Offset {
        self.next_offset
    }

    /// Returns the timestamp of the first record.
    #[must_use]
    pub const fn first_timestamp(&self) -> Timestamp {
        self.first_timestamp
    }

    /// Returns the number of appended records.
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.count
    }

    /// Returns the encoded size so far, container header included.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Returns true once the source reported the partition exhausted.
    #[must_use]
    pub const fn saw_eof(&self) -> bool {
        self.saw_eof
    }

    /// Returns true once the batch has sealed.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.writer.is_none()
    }

    /// Appends a record to the open batch.
    ///
    /// # Errors
    /// Returns [`BufferError::NonContiguous`] if the record's offset is
    /// not exactly the expected next offset, or
    /// [`BufferError::AlreadySealed`] if the batch has sealed.
    pub fn append(&mut self, record: &StreamRecord) -> BufferResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(BufferError::AlreadySealed {
                key: self.key.clone(),
            });
        };

        if record.offset != self.next_offset {
            return Err(BufferError::NonContiguous {
                key: self.key.clone(),
                expected: self.next_offset,
                actual: record.offset,
            });
        }

        writer.append(
            record.timestamp,
            record.key.as_deref(),
            record.value.as_deref(),
        )?;
        self.byte_size = writer.byte_size();
        self.count += 1;
        self.next_offset = record.offset.next();
        // A flowing partition is not exhausted.
        self.saw_eof = false;

        Ok(())
    }

    /// Marks the partition as momentarily exhausted. No-op once sealed.
    pub fn mark_eof(&mut self) {
        if self.writer.is_some() {
            self.saw_eof = true;
        }
    }

    /// Seals the batch, finalizing checksum and size.
    ///
    /// # Errors
    /// Returns [`BufferError::AlreadySealed`] if called twice.
    ///
    /// # Panics
    /// Panics if the batch holds no records; buffers are only created
    /// together with their first record, so an empty seal is unreachable.
    pub fn seal(&mut self) -> BufferResult<SealedArtifact> {
        let Some(writer) = self.writer.take() else {
            return Err(BufferError::AlreadySealed {
                key: self.key.clone(),
            });
        };
        assert!(self.count > 0, "batch must hold at least one record");

        let (payload, digest) = writer.finish();
        self.byte_size = payload.len() as u64;

        let artifact = SealedArtifact {
            key: self.key.clone(),
            first_offset: self.first_offset,
            final_offset: Offset::new(self.next_offset.get() - 1),
            record_count: self.count,
            byte_size: self.byte_size,
            digest,
            payload,
        };

        tracing::debug!(
            key = %artifact.key,
            first_offset = artifact.first_offset.get(),
            final_offset = artifact.final_offset.get(),
            records = artifact.record_count,
            bytes = artifact.byte_size,
            "sealed batch"
        );

        Ok(artifact)
    }
}

/// Immutable, checksummed view of a sealed batch.
///
/// Exists only between seal and successful hand-off: sinks borrow it for
/// the duration of their save call and must not retain the payload handle
/// beyond it.
#[derive(Debug, Clone)]
pub struct SealedArtifact {
    key: PartitionKey,
    first_offset: Offset,
    final_offset: Offset,
    record_count: u64,
    byte_size: u64,
    digest: Digest,
    payload: Bytes,
}

impl SealedArtifact {
    /// Returns the partition this artifact was accumulated from.
    #[must_use]
    pub const fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Returns the first offset in the artifact.
    #[must_use]
    pub const fn first_offset(&self) -> Offset {
        self.first_offset
    }

    /// Returns the final (inclusive) offset in the artifact.
    #[must_use]
    pub const fn final_offset(&self) -> Offset {
        self.final_offset
    }

    /// Returns the offset the consumer should commit after delivery:
    /// one past the final offset.
    #[must_use]
    pub const fn commit_next_offset(&self) -> Offset {
        self.final_offset.next()
    }

    /// Returns the number of records in the artifact.
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Returns the encoded payload size in bytes.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Returns the MD5 digest of the encoded payload.
    #[must_use]
    pub const fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Returns a handle to the encoded payload.
    ///
    /// The handle is cheap to clone and always reads from the start.
    #[must_use]
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }
}

#[cfg(test)]
mod tests {
    use silo_codec::{BatchReader, CodecResult};
    use silo_core::PartitionIndex;

    use super::*;

    const START_MS: i64 = 1_475_273_684_343;
    const MINUTE_MS: i64 = 60 * 1000;

    fn record(offset: i64, timestamp_ms: i64, value: &'static [u8]) -> StreamRecord {
        StreamRecord {
            topic: "topic".to_string(),
            partition: PartitionIndex::new(0),
            offset: Offset::new(offset),
            timestamp: Timestamp::from_millis(timestamp_ms),
            key: Some(Bytes::from_static(b"")),
            value: Some(Bytes::from_static(value)),
        }
    }

    fn batch_with(records: &[StreamRecord]) -> PendingBatch {
        let mut batch = PendingBatch::new(&records[0], Compression::None);
        for record in records {
            batch.append(record).unwrap();
        }
        batch
    }

    #[test]
    fn test_contiguous_appends_succeed() {
        let records: Vec<_> = (0..5)
            .map(|i| record(i, START_MS + i * MINUTE_MS, b"<v>"))
            .collect();
        let batch = batch_with(&records);
        assert_eq!(batch.record_count(), 5);
        assert_eq!(batch.first_offset(), Offset::new(0));
        assert_eq!(batch.expected_next_offset(), Offset::new(5));
    }

    #[test]
    fn test_offset_gap_faults() {
        let mut batch = batch_with(&[record(10, START_MS, b"a")]);
        let result = batch.append(&record(12, START_MS + 1, b"b"));
        assert!(matches!(
            result,
            Err(BufferError::NonContiguous { expected, actual, .. })
                if expected == Offset::new(11) && actual == Offset::new(12)
        ));
    }

    #[test]
    fn test_offset_repeat_faults() {
        let mut batch = batch_with(&[record(10, START_MS, b"a")]);
        let result = batch.append(&record(10, START_MS + 1, b"b"));
        assert!(matches!(result, Err(BufferError::NonContiguous { .. })));
    }

    #[test]
    fn test_append_after_seal_faults() {
        let mut batch = batch_with(&[record(0, START_MS, b"a")]);
        batch.seal().unwrap();
        let result = batch.append(&record(1, START_MS + 1, b"b"));
        assert!(matches!(result, Err(BufferError::AlreadySealed { .. })));
    }

    #[test]
    fn test_double_seal_faults() {
        let mut batch = batch_with(&[record(0, START_MS, b"a")]);
        batch.seal().unwrap();
        assert!(batch.is_sealed());
        assert!(matches!(
            batch.seal(),
            Err(BufferError::AlreadySealed { .. })
        ));
    }

    #[test]
    fn test_mark_eof_noop_after_seal() {
        let mut batch = batch_with(&[record(0, START_MS, b"a")]);
        batch.seal().unwrap();
        batch.mark_eof();
        assert!(!batch.saw_eof());
    }

    #[test]
    fn test_artifact_metadata() {
        let records: Vec<_> = (3..8)
            .map(|i| record(i, START_MS + i * MINUTE_MS, b"<v>"))
            .collect();
        let mut batch = batch_with(&records);
        let size_before_seal = batch.byte_size();

        let artifact = batch.seal().unwrap();
        assert_eq!(artifact.first_offset(), Offset::new(3));
        assert_eq!(artifact.final_offset(), Offset::new(7));
        assert_eq!(artifact.commit_next_offset(), Offset::new(8));
        assert_eq!(artifact.record_count(), 5);
        assert_eq!(artifact.byte_size(), size_before_seal);
        assert_eq!(artifact.payload().len() as u64, artifact.byte_size());
    }

    #[test]
    fn test_sealed_payload_reads_back() {
        let records: Vec<_> = (0..5)
            .map(|i| {
                let mut r = record(i, START_MS + i * MINUTE_MS, b"");
                r.value = Some(Bytes::from(format!("<{i}>")));
                r
            })
            .collect();
        let mut batch = batch_with(&records);
        let artifact = batch.seal().unwrap();

        let decoded: Vec<_> = BatchReader::new(artifact.payload())
            .unwrap()
            .collect::<CodecResult<_>>()
            .unwrap();
        assert_eq!(decoded.len(), 5);
        for (i, archived) in decoded.iter().enumerate() {
            #[allow(clippy::cast_possible_wrap)]
            let i = i as i64;
            assert_eq!(archived.timestamp, Timestamp::from_millis(START_MS + i * MINUTE_MS));
            assert_eq!(archived.key, Some(Bytes::from_static(b"")));
            assert_eq!(archived.value, Some(Bytes::from(format!("<{i}>"))));
        }
    }

    #[test]
    fn test_byte_size_includes_header_at_creation() {
        let batch = PendingBatch::new(&record(0, START_MS, b""), Compression::None);
        assert_eq!(batch.byte_size(), silo_codec::CONTAINER_HEADER_SIZE as u64);
    }
}
