//! Default limits and thresholds.
//!
//! Every threshold the archiver applies has an explicit, named default
//! here. Deployments override them through configuration.

/// Default maximum artifact size in bytes before a batch is sealed (64 MiB).
pub const ARTIFACT_SIZE_BYTES_MAX_DEFAULT: u64 = 64 * 1024 * 1024;

/// Default maximum logical age of a batch in milliseconds (45 minutes).
///
/// Logical age is measured against record timestamps, not the wall clock.
pub const ARTIFACT_AGE_MS_MAX_DEFAULT: i64 = 45 * 60 * 1000;

/// Default extra wall-clock grace for idle partitions in milliseconds (8 hours).
///
/// Layered on top of the age limit before an exhausted partition's batch is
/// sealed, to absorb delivery skew from the stream source.
pub const IDLE_GRACE_MS_DEFAULT: i64 = 8 * 3600 * 1000;

/// Default interval between idle-sweep evaluations in seconds.
pub const IDLE_CHECK_INTERVAL_SECS_DEFAULT: u64 = 15;
