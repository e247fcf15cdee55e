//! Silo Codec - The encoded record container.
//!
//! Batches of records are written into a self-describing container before
//! delivery to sinks. The container is append-only while a batch is open:
//! each appended record becomes one length-prefixed frame, and every byte
//! written updates a running MD5 digest and byte counter so the owning
//! buffer always knows its exact encoded size and checksum.
//!
//! # Container Format
//!
//! ```text
//! +--------------------+
//! | Header (16 bytes)  |
//! +--------------------+
//! | Frame 1            |
//! +--------------------+
//! | Frame 2            |
//! +--------------------+
//! | ...                |
//! +--------------------+
//! ```
//!
//! Header:
//! - Magic (8 bytes): "SILOARC1"
//! - Version (4 bytes): format version
//! - Compression (1 byte): codec applied to each frame body
//! - Reserved (3 bytes)
//!
//! Each frame is a 4-byte little-endian body length followed by the body:
//! `timestamp (i64) | key (i32 length prefix, -1 = absent) | value (i32
//! length prefix, -1 = absent)`. With deflate compression the body is
//! compressed independently per frame, so byte counting stays exact at
//! append time and frames remain individually decodable.
//!
//! Offsets are not stored in the container; the offset range is artifact
//! metadata carried alongside the payload.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod checksum;
mod container;
mod error;

pub use checksum::{ChecksumWriter, Digest};
pub use container::{
    ArchivedRecord, BatchReader, BatchWriter, Compression, CONTAINER_HEADER_SIZE,
};
pub use error::{CodecError, CodecResult};
