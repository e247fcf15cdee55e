//! Silo stream archiver daemon.
//!
//! Consumes one topic from a Kafka-compatible broker and archives it into
//! sealed, checksummed artifacts delivered to the configured sinks. The
//! consumer offset advances only after every sink accepted an artifact,
//! so a crash at any point replays uncommitted records on restart.
//!
//! # Usage
//!
//! Archive a topic to S3 with metadata rows in Postgres:
//!
//! ```bash
//! silo-server --brokers broker:9092 --group silo-archive --topic events \
//!     --s3-url s3://archive-bucket/streams \
//!     --postgres-url "host=db user=silo dbname=archive"
//! ```
//!
//! Archive to a local directory (development):
//!
//! ```bash
//! silo-server --brokers localhost:9092 --group silo-dev --topic events \
//!     --archive-dir /tmp/silo
//! ```
//!
//! At least one sink must be configured. Sinks are invoked in a fixed
//! order per artifact: object store, filesystem, then Postgres.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use silo_buffer::SealPolicy;
use silo_codec::Compression;
use silo_core::limits;
use silo_ingest::IngestCoordinator;
use silo_sink::{
    FilesystemSink, FilesystemSinkConfig, PostgresSink, PostgresSinkConfig, S3Sink, S3SinkConfig,
    Sink, SinkFanout,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod consumer;

use consumer::{build_consumer, run_loop, ServerError};

/// Compression codec for archived batches.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum CompressionArg {
    /// Store frames uncompressed.
    #[default]
    None,
    /// Deflate-compress each frame.
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Deflate => Self::Deflate,
        }
    }
}

/// Silo stream archiver.
#[derive(Parser, Debug)]
#[command(name = "silo-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kafka bootstrap broker list.
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// Consumer group id.
    #[arg(long)]
    group: String,

    /// Topic to archive.
    #[arg(long)]
    topic: String,

    /// What to do when the group has no committed offset
    /// (earliest, latest, or error).
    #[arg(long, default_value = "error")]
    offset_reset: String,

    /// Object store destination, e.g. `s3://bucket/prefix`.
    /// Region/endpoint overrides come from `SILO_S3_*` env vars.
    #[arg(long)]
    s3_url: Option<String>,

    /// Local directory to archive into.
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Postgres connection string for artifact metadata rows.
    #[arg(long)]
    postgres_url: Option<String>,

    /// Maximum artifact size in bytes before sealing.
    #[arg(long, default_value_t = limits::ARTIFACT_SIZE_BYTES_MAX_DEFAULT)]
    max_bytes: u64,

    /// Maximum logical batch age in milliseconds before sealing.
    #[arg(long, default_value_t = limits::ARTIFACT_AGE_MS_MAX_DEFAULT)]
    max_age_ms: i64,

    /// Extra wall-clock grace for idle partitions, in milliseconds.
    #[arg(long, default_value_t = limits::IDLE_GRACE_MS_DEFAULT)]
    idle_grace_ms: i64,

    /// Interval between idle-partition sweeps, in seconds.
    #[arg(long, default_value_t = limits::IDLE_CHECK_INTERVAL_SECS_DEFAULT)]
    idle_check_secs: u64,

    /// Compression codec for archived batches.
    #[arg(long, value_enum, default_value = "none")]
    compression: CompressionArg,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Builds the ordered sink list from the CLI surface.
async fn build_sinks(args: &Args) -> Result<Vec<Box<dyn Sink>>, ServerError> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if let Some(url) = &args.s3_url {
        let config = S3SinkConfig::from_url(url)?.with_env_overrides();
        sinks.push(Box::new(S3Sink::new(config).await?));
    }

    if let Some(dir) = &args.archive_dir {
        let config = FilesystemSinkConfig::new(dir.clone());
        sinks.push(Box::new(FilesystemSink::new(config).await?));
    }

    if let Some(url) = &args.postgres_url {
        let sink = PostgresSink::connect(PostgresSinkConfig::new(url.clone())).await?;
        sink.ensure_schema().await?;
        sinks.push(Box::new(sink));
    }

    if sinks.is_empty() {
        return Err(ServerError::InvalidConfig {
            reason: "no sink configured; pass --s3-url, --archive-dir, or --postgres-url"
                .to_string(),
        });
    }

    Ok(sinks)
}

async fn run(args: Args) -> Result<(), ServerError> {
    let sinks = build_sinks(&args).await?;
    info!(
        topic = %args.topic,
        group = %args.group,
        sinks = sinks.len(),
        max_bytes = args.max_bytes,
        max_age_ms = args.max_age_ms,
        "starting archiver"
    );

    let policy = SealPolicy::new(args.max_bytes, args.max_age_ms, args.idle_grace_ms);
    let fanout = SinkFanout::new(sinks);

    let (consumer, committer) = build_consumer(
        &args.brokers,
        &args.group,
        &args.topic,
        &args.offset_reset,
    )?;

    let coordinator = IngestCoordinator::new(
        policy,
        args.compression.into(),
        fanout,
        committer,
    )
    .with_idle_interval(std::time::Duration::from_secs(args.idle_check_secs));

    run_loop(&consumer, coordinator, &args.topic).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("set tracing subscriber");

    if let Err(e) = run(args).await {
        error!(error = %e, "archiver terminated");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_match_limits() {
        let args = Args::parse_from(["silo-server", "--group", "g", "--topic", "t"]);
        assert_eq!(args.max_bytes, 64 * 1024 * 1024);
        assert_eq!(args.max_age_ms, 45 * 60 * 1000);
        assert_eq!(args.idle_grace_ms, 8 * 3600 * 1000);
        assert_eq!(args.offset_reset, "error");
    }

    #[test]
    fn test_compression_arg_maps() {
        assert!(matches!(
            Compression::from(CompressionArg::None),
            Compression::None
        ));
        assert!(matches!(
            Compression::from(CompressionArg::Deflate),
            Compression::Deflate
        ));
    }
}
