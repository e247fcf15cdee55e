//! Silo Core - Shared types for the Silo stream archiver.
//!
//! This crate provides the identifiers and record model shared by every
//! Silo crate: partition keys, offsets, millisecond timestamps, and the
//! incoming stream record. It carries no I/O and no policy.
//!
//! # Design Principles
//!
//! - **Strongly-typed wrappers**: Prevent mixing up a partition index with
//!   an offset or a raw count.
//! - **Explicit limits**: Default thresholds live in [`limits`], not
//!   scattered magic numbers.
//! - **No unsafe code**.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod limits;
mod record;
mod types;

pub use record::{Offset, StreamRecord, Timestamp};
pub use types::{PartitionIndex, PartitionKey};
