//! Silo Sink - Durable destinations for sealed artifacts.
//!
//! A sink is a capability with a single operation: save one sealed
//! artifact. Sinks must be idempotent on the artifact's offset range,
//! because delivery is at-least-once; after a crash between delivery and
//! offset commit, the same artifact is delivered again.
//!
//! # Backends
//!
//! - [`S3Sink`]: S3-compatible object storage (behind the `s3` feature)
//! - [`FilesystemSink`]: local directory tree, for development and testing
//! - [`PostgresSink`]: one metadata row per artifact
//! - [`MemorySink`]: in-memory log with fault injection, for tests
//!
//! [`SinkFanout`] delivers one artifact to an ordered list of sinks,
//! stopping at the first failure.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod fanout;
mod filesystem;
mod memory;
mod postgres;
#[cfg(feature = "s3")]
mod s3;
mod sink;

pub use error::{SinkError, SinkResult};
pub use fanout::SinkFanout;
pub use filesystem::{FilesystemSink, FilesystemSinkConfig};
pub use memory::{MemorySink, SavedArtifact};
pub use postgres::{PostgresSink, PostgresSinkConfig};
#[cfg(feature = "s3")]
pub use s3::{S3Sink, S3SinkConfig};
pub use sink::{ArtifactKey, Sink};
