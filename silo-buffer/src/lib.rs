//! Silo Buffer - Per-partition accumulation and sealing.
//!
//! One open [`PendingBatch`] exists per actively-consumed partition, held
//! in a [`BufferRegistry`]. Records append to the batch's encoded
//! container until one of three [`SealPolicy`] triggers fires (byte size,
//! logical age, idle grace), at which point the batch seals into an
//! immutable [`SealedArtifact`] for sink delivery.
//!
//! # Invariants
//!
//! - Offsets within an open batch increase by exactly one per appended
//!   record; any gap or repeat is a fatal, typed error.
//! - A sealed batch accepts no further mutation: checksum, byte size, and
//!   offset range are final.
//! - The registry is the sole owner of open batches; sinks only ever see
//!   the sealed, read-only artifact.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod batch;
mod error;
mod registry;
mod seal;

pub use batch::{PendingBatch, SealedArtifact};
pub use error::{BufferError, BufferResult};
pub use registry::BufferRegistry;
pub use seal::SealPolicy;
