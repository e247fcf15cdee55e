//! Keyed store of open batches, one per partition.

use std::collections::HashMap;

use silo_codec::Compression;
use silo_core::{PartitionKey, StreamRecord};
use tracing::info;

use crate::batch::PendingBatch;

/// Owns every open [`PendingBatch`], keyed by partition.
///
/// Entries are created lazily on the first record for a key and removed
/// either after a successful commit or when the partition is revoked.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: HashMap<PartitionKey, PendingBatch>,
    compression: Compression,
}

impl BufferRegistry {
    /// Creates an empty registry; new batches encode with `compression`.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        Self {
            buffers: HashMap::new(),
            compression,
        }
    }

    /// Returns the open batch for the record's partition, creating one
    /// anchored at the record if none exists.
    pub fn get_or_create(&mut self, record: &StreamRecord) -> &mut PendingBatch {
        self.buffers
            .entry(record.partition_key())
            .or_insert_with(|| {
                info!(
                    key = %record.partition_key(),
                    first_offset = record.offset.get(),
                    "opened batch"
                );
                PendingBatch::new(record, self.compression)
            })
    }

    /// Returns the open batch for `key`, if any.
    pub fn get_mut(&mut self, key: &PartitionKey) -> Option<&mut PendingBatch> {
        self.buffers.get_mut(key)
    }

    /// Detaches and returns the batch for `key`, transferring ownership.
    pub fn remove(&mut self, key: &PartitionKey) -> Option<PendingBatch> {
        self.buffers.remove(key)
    }

    /// Removes and discards every batch for the given keys, without
    /// sealing or committing.
    ///
    /// Used on partition revocation: the buffered offsets were never
    /// committed, so the records are redelivered to the new assignee.
    /// Returns how many batches were discarded.
    pub fn revoke_all(&mut self, keys: &[PartitionKey]) -> usize {
        let mut discarded = 0;
        for key in keys {
            if let Some(batch) = self.buffers.remove(key) {
                info!(
                    key = %key,
                    buffered_records = batch.record_count(),
                    "discarded batch on revocation"
                );
                discarded += 1;
            }
        }
        discarded
    }

    /// Iterates over the open batches.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &PendingBatch)> {
        self.buffers.iter()
    }

    /// Returns the number of open batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no batch is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
