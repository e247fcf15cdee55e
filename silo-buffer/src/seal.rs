//! Sealing policy.
//!
//! Pure decision functions over a batch's accumulated state. The policy
//! holds the configured thresholds and nothing else; it never mutates a
//! batch and keeps no history, so the same policy value serves every
//! partition.

use silo_core::{limits, StreamRecord, Timestamp};

use crate::batch::PendingBatch;

/// Thresholds governing when an open batch seals.
///
/// Three independent triggers, evaluated by the coordinator in this
/// precedence:
///
/// 1. **Age, before append**: appending a record whose timestamp is
///    `max_age_ms` or more past the batch's first timestamp seals the
///    batch first; the incoming record anchors a new one. A sealed
///    batch's logical span therefore never exceeds `max_age_ms`.
/// 2. **Size, after append**: a batch whose encoded size reaches
///    `max_bytes` seals immediately.
/// 3. **Idle**: a batch whose partition is exhausted (`saw_eof`) seals
///    once the wall clock passes `first_timestamp + max_age_ms +
///    idle_grace_ms`. The grace absorbs delivery skew from a source that
///    still holds records belonging to this batch.
#[derive(Debug, Clone, Copy)]
pub struct SealPolicy {
    /// Maximum encoded batch size in bytes.
    pub max_bytes: u64,
    /// Maximum logical age in milliseconds, measured against record
    /// timestamps.
    pub max_age_ms: i64,
    /// Extra wall-clock slack for idle sealing, in milliseconds.
    pub idle_grace_ms: i64,
}

impl Default for SealPolicy {
    fn default() -> Self {
        Self {
            max_bytes: limits::ARTIFACT_SIZE_BYTES_MAX_DEFAULT,
            max_age_ms: limits::ARTIFACT_AGE_MS_MAX_DEFAULT,
            idle_grace_ms: limits::IDLE_GRACE_MS_DEFAULT,
        }
    }
}

impl SealPolicy {
    /// Creates a policy with explicit thresholds.
    ///
    /// # Panics
    /// Panics if any threshold is not positive.
    #[must_use]
    pub fn new(max_bytes: u64, max_age_ms: i64, idle_grace_ms: i64) -> Self {
        assert!(max_bytes > 0, "max_bytes must be positive");
        assert!(max_age_ms > 0, "max_age_ms must be positive");
        assert!(idle_grace_ms >= 0, "idle_grace_ms must not be negative");
        Self {
            max_bytes,
            max_age_ms,
            idle_grace_ms,
        }
    }

    /// Sets the size threshold.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets the logical age threshold.
    #[must_use]
    pub const fn with_max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    /// Sets the idle grace.
    #[must_use]
    pub const fn with_idle_grace_ms(mut self, idle_grace_ms: i64) -> Self {
        self.idle_grace_ms = idle_grace_ms;
        self
    }

    /// Returns true if `batch` must seal before `incoming` is appended.
    ///
    /// The comparison anchors on the batch's FIRST timestamp, not the
    /// previously appended record. With out-of-order producer timestamps
    /// this can seal later than a strictly monotonic comparison would;
    /// downstream consumers depend on this exact behavior.
    #[must_use]
    pub fn should_seal_before_append(&self, batch: &PendingBatch, incoming: &StreamRecord) -> bool {
        incoming.timestamp.millis_since(batch.first_timestamp()) >= self.max_age_ms
    }

    /// Returns true if `batch` must seal after the append that just
    /// completed.
    #[must_use]
    pub fn should_seal_after_append(&self, batch: &PendingBatch) -> bool {
        batch.byte_size() >= self.max_bytes
    }

    /// Returns true if `batch` qualifies for an idle seal at wall-clock
    /// `now`.
    ///
    /// Only batches whose partition reported end-of-stream qualify; an
    /// append clears that flag, so a partition that resumes producing
    /// within the grace window is never spuriously sealed. The boundary
    /// is closed: the batch qualifies exactly at
    /// `first_timestamp + max_age_ms + idle_grace_ms`.
    #[must_use]
    pub fn should_seal_idle(&self, batch: &PendingBatch, now: Timestamp) -> bool {
        batch.saw_eof()
            && now.millis_since(batch.first_timestamp())
                >= self.max_age_ms.saturating_add(self.idle_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use silo_codec::Compression;
    use silo_core::{Offset, PartitionIndex};

    use super::*;

    const MINUTE_MS: i64 = 60 * 1000;
    const MAX_AGE_MS: i64 = 10 * MINUTE_MS;
    const GRACE_MS: i64 = 60 * MINUTE_MS;

    fn record(offset: i64, timestamp_ms: i64) -> StreamRecord {
        StreamRecord {
            topic: "topic".to_string(),
            partition: PartitionIndex::new(0),
            offset: Offset::new(offset),
            timestamp: Timestamp::from_millis(timestamp_ms),
            key: None,
            value: Some(Bytes::from_static(b"v")),
        }
    }

    fn policy() -> SealPolicy {
        SealPolicy::new(64 * 1024, MAX_AGE_MS, GRACE_MS)
    }

    #[test]
    fn test_age_boundary_is_closed() {
        let start_ms = 1_475_273_684_343;
        let batch = PendingBatch::new(&record(0, start_ms), Compression::None);
        let policy = policy();

        assert!(!policy.should_seal_before_append(&batch, &record(1, start_ms)));
        assert!(!policy.should_seal_before_append(&batch, &record(1, start_ms + MAX_AGE_MS - 1)));
        assert!(policy.should_seal_before_append(&batch, &record(1, start_ms + MAX_AGE_MS)));
    }

    #[test]
    fn test_age_anchors_on_first_timestamp() {
        let start_ms = 1_000_000;
        let mut batch = PendingBatch::new(&record(0, start_ms), Compression::None);
        batch.append(&record(0, start_ms)).unwrap();
        // A later record with an older timestamp does not move the anchor.
        batch.append(&record(1, start_ms - 5_000)).unwrap();

        let policy = policy();
        assert!(!policy
            .should_seal_before_append(&batch, &record(2, start_ms + MAX_AGE_MS - 1)));
        assert!(policy.should_seal_before_append(&batch, &record(2, start_ms + MAX_AGE_MS)));
    }

    #[test]
    fn test_size_trigger() {
        let mut batch = PendingBatch::new(&record(0, 1_000), Compression::None);
        let policy = SealPolicy::new(64, MAX_AGE_MS, GRACE_MS);

        batch.append(&record(0, 1_000)).unwrap();
        assert!(!policy.should_seal_after_append(&batch));

        let mut big = record(1, 1_001);
        big.value = Some(Bytes::from(vec![0u8; 64]));
        batch.append(&big).unwrap();
        assert!(policy.should_seal_after_append(&batch));
    }

    #[test]
    fn test_idle_requires_eof_and_closed_boundary() {
        let start_ms = 1_475_273_684_343;
        let mut batch = PendingBatch::new(&record(0, start_ms), Compression::None);
        batch.append(&record(0, start_ms)).unwrap();

        let policy = policy();
        let deadline = Timestamp::from_millis(start_ms + MAX_AGE_MS + GRACE_MS);

        // Without eof, never idle-sealed.
        assert!(!policy.should_seal_idle(&batch, deadline));

        batch.mark_eof();
        assert!(!policy.should_seal_idle(&batch, Timestamp::from_millis(start_ms)));
        assert!(!policy.should_seal_idle(
            &batch,
            Timestamp::from_millis(start_ms + MAX_AGE_MS + GRACE_MS - 1)
        ));
        assert!(policy.should_seal_idle(&batch, deadline));
    }

    #[test]
    fn test_append_clears_eof() {
        let start_ms = 1_475_273_684_343;
        let mut batch = PendingBatch::new(&record(0, start_ms), Compression::None);
        batch.append(&record(0, start_ms)).unwrap();
        batch.mark_eof();

        let policy = policy();
        let deadline = Timestamp::from_millis(start_ms + MAX_AGE_MS + GRACE_MS);
        assert!(policy.should_seal_idle(&batch, deadline));

        batch.append(&record(1, start_ms + 1)).unwrap();
        assert!(!policy.should_seal_idle(&batch, deadline));
    }
}
