//! Stream record model.
//!
//! A record is the unit of data consumed from the stream: an offset within
//! its partition, a millisecond timestamp, and optional key/value payloads.
//! Timestamps drive the age-based sealing policy, so a record without one
//! cannot be archived; the absent state is represented by a sentinel rather
//! than `Option` so it flows through framing code unchanged.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::types::{PartitionIndex, PartitionKey};

/// Millisecond timestamp since the Unix epoch.
///
/// Negative values mean "no timestamp" (the wire encodes absence as `-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Millis fit i64 for centuries.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// The "no timestamp" sentinel.
    #[must_use]
    pub const fn none() -> Self {
        Self(-1)
    }

    /// Returns true if this represents "no timestamp".
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }

    /// Milliseconds elapsed since `earlier`.
    ///
    /// Saturates instead of wrapping; callers compare the result against
    /// age thresholds and a clamped zero is the conservative answer.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Offset of a record within its partition log.
///
/// Offsets are assigned by the stream source, are non-negative, and
/// increase by exactly one per record within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Offset(i64);

impl Offset {
    /// Creates an offset from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw offset value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns the next offset.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Offset {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// A single record consumed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Topic the record was consumed from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: PartitionIndex,
    /// Offset within the partition.
    pub offset: Offset,
    /// Record timestamp. May be [`Timestamp::none`] if the source did not
    /// provide one; such records are rejected at the ingest boundary.
    pub timestamp: Timestamp,
    /// Optional record key.
    pub key: Option<Bytes>,
    /// Optional record value.
    pub value: Option<Bytes>,
}

impl StreamRecord {
    /// Returns the partition key this record belongs to.
    #[must_use]
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.topic.clone(), self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_sentinel() {
        assert!(Timestamp::none().is_none());
        assert!(Timestamp::from_millis(-1).is_none());
        assert!(!Timestamp::from_millis(0).is_none());
        assert_eq!(Timestamp::default(), Timestamp::none());
    }

    #[test]
    fn test_timestamp_millis_since() {
        let first = Timestamp::from_millis(1_000);
        let later = Timestamp::from_millis(61_000);
        assert_eq!(later.millis_since(first), 60_000);
        // Out-of-order timestamps clamp via saturation, never wrap.
        assert_eq!(
            Timestamp::from_millis(i64::MIN).millis_since(Timestamp::from_millis(1)),
            i64::MIN
        );
    }

    #[test]
    fn test_offset_next() {
        let offset = Offset::new(41);
        assert_eq!(offset.next().get(), 42);
        assert_eq!(format!("{offset}"), "41");
    }

    #[test]
    fn test_record_partition_key() {
        let record = StreamRecord {
            topic: "events".to_string(),
            partition: PartitionIndex::new(2),
            offset: Offset::new(10),
            timestamp: Timestamp::from_millis(1_000),
            key: Some(Bytes::from_static(b"k")),
            value: None,
        };
        assert_eq!(format!("{}", record.partition_key()), "events/2");
    }
}
