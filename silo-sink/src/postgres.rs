//! Relational metadata sink.
//!
//! Records one row per delivered artifact: partition identity, offset
//! range, record count, byte size, and checksum. Downstream jobs use the
//! table to locate artifacts in the object store and to verify archive
//! completeness (consecutive offset ranges per partition).
//!
//! Idempotence comes from the primary key on
//! `(topic, partition, start_offset)` plus `ON CONFLICT DO NOTHING`:
//! redelivering an artifact after a crash inserts nothing new.

use async_trait::async_trait;
use silo_buffer::SealedArtifact;
use tokio_postgres::NoTls;
use tracing::{error, info};

use crate::error::{SinkError, SinkResult};
use crate::sink::{ArtifactKey, Sink};

/// Default table name for artifact metadata.
const TABLE_DEFAULT: &str = "silo_artifacts";

/// Configuration for the Postgres metadata sink.
#[derive(Debug, Clone)]
pub struct PostgresSinkConfig {
    /// Connection string, e.g.
    /// `host=localhost user=silo dbname=archive` or a `postgres://` URL.
    pub conn_string: String,

    /// Table the sink writes to. Default: `silo_artifacts`.
    pub table: String,
}

impl PostgresSinkConfig {
    /// Creates a configuration with the default table name.
    #[must_use]
    pub fn new(conn_string: impl Into<String>) -> Self {
        Self {
            conn_string: conn_string.into(),
            table: TABLE_DEFAULT.to_string(),
        }
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn validate(&self) -> SinkResult<()> {
        let valid = !self.table.is_empty()
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(SinkError::InvalidConfig {
                reason: format!("invalid table name '{}'", self.table),
            })
        }
    }
}

/// Sink that records artifact metadata rows in Postgres.
pub struct PostgresSink {
    client: tokio_postgres::Client,
    insert_sql: String,
    schema_sql: String,
}

impl PostgresSink {
    /// Connects to Postgres and prepares the sink.
    ///
    /// The connection task is spawned onto the current runtime; a broken
    /// connection surfaces as a failed save, not a panic.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the connection
    /// cannot be established.
    pub async fn connect(config: PostgresSinkConfig) -> SinkResult<Self> {
        config.validate()?;

        let (client, connection) = tokio_postgres::connect(&config.conn_string, NoTls)
            .await
            .map_err(|e| SinkError::io("connect", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection terminated");
            }
        });

        let insert_sql = format!(
            "INSERT INTO {table} \
             (topic, partition, start_offset, final_offset, record_count, byte_size, md5_hex, stored_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             ON CONFLICT (topic, partition, start_offset) DO NOTHING",
            table = config.table
        );
        let schema_sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             topic TEXT NOT NULL, \
             partition INTEGER NOT NULL, \
             start_offset BIGINT NOT NULL, \
             final_offset BIGINT NOT NULL, \
             record_count BIGINT NOT NULL, \
             byte_size BIGINT NOT NULL, \
             md5_hex TEXT NOT NULL, \
             stored_at TIMESTAMPTZ NOT NULL, \
             PRIMARY KEY (topic, partition, start_offset))",
            table = config.table
        );

        info!(table = %config.table, "postgres sink connected");
        Ok(Self {
            client,
            insert_sql,
            schema_sql,
        })
    }

    /// Creates the metadata table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_schema(&self) -> SinkResult<()> {
        self.client
            .execute(self.schema_sql.as_str(), &[])
            .await
            .map_err(|e| SinkError::io("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl Sink for PostgresSink {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    #[allow(clippy::cast_possible_wrap)] // Counts and sizes are far below i64::MAX.
    async fn save(&self, artifact: &SealedArtifact) -> SinkResult<()> {
        let key = artifact.key();
        self.client
            .execute(
                self.insert_sql.as_str(),
                &[
                    &key.topic,
                    &key.partition.get(),
                    &artifact.first_offset().get(),
                    &artifact.final_offset().get(),
                    &(artifact.record_count() as i64),
                    &(artifact.byte_size() as i64),
                    &artifact.digest().to_hex(),
                ],
            )
            .await
            .map_err(|e| SinkError::WriteFailed {
                sink: self.kind(),
                key: ArtifactKey::from_artifact(artifact).as_str().to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_name() {
        let config = PostgresSinkConfig::new("host=localhost");
        assert_eq!(config.table, "silo_artifacts");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_table_name_validation() {
        let config = PostgresSinkConfig::new("host=localhost").with_table("archive_2024");
        assert!(config.validate().is_ok());

        let config = PostgresSinkConfig::new("host=localhost").with_table("bad; DROP TABLE x");
        assert!(config.validate().is_err());

        let config = PostgresSinkConfig::new("host=localhost").with_table("");
        assert!(config.validate().is_err());
    }
}
