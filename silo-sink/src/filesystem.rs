//! Filesystem-based sink for local development and testing.
//!
//! Artifacts are stored as files at
//! `{base_path}/{topic}/{partition:06}/{first_offset:020}`, mirroring the
//! object-store key layout so a local archive can be synced to a bucket
//! unchanged. Writes go to a temp file first and rename into place, so a
//! crash never leaves a partial artifact at the final path. Overwriting
//! an existing file with the same bytes makes redelivery idempotent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use silo_buffer::SealedArtifact;

use crate::error::{SinkError, SinkResult};
use crate::sink::{ArtifactKey, Sink};

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for the filesystem sink.
#[derive(Debug, Clone)]
pub struct FilesystemSinkConfig {
    /// Base directory for all artifacts.
    pub base_path: PathBuf,

    /// Whether to fsync after writes for durability.
    ///
    /// Default: `true`. Set to `false` for faster tests.
    pub sync_on_write: bool,

    /// Create the base directory if it doesn't exist.
    ///
    /// Default: `true`.
    pub create_if_missing: bool,
}

impl FilesystemSinkConfig {
    /// Creates a configuration with safe defaults.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            sync_on_write: true,
            create_if_missing: true,
        }
    }

    /// Creates a configuration optimized for testing (no fsync).
    #[must_use]
    pub fn for_testing(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            sync_on_write: false,
            create_if_missing: true,
        }
    }
}

// -----------------------------------------------------------------------------
// FilesystemSink
// -----------------------------------------------------------------------------

/// Sink that stores artifacts in a local directory tree.
#[derive(Debug, Clone)]
pub struct FilesystemSink {
    config: FilesystemSinkConfig,
}

impl FilesystemSink {
    /// Creates a filesystem sink with the given configuration.
    ///
    /// # Errors
    /// Returns an error if `create_if_missing` is true and directory
    /// creation fails.
    pub async fn new(config: FilesystemSinkConfig) -> SinkResult<Self> {
        if config.base_path.as_os_str().is_empty() {
            return Err(SinkError::InvalidConfig {
                reason: "base path must not be empty".to_string(),
            });
        }

        if config.create_if_missing {
            tokio::fs::create_dir_all(&config.base_path)
                .await
                .map_err(|e| SinkError::io("create_base_dir", e))?;
        }

        Ok(Self { config })
    }

    /// Returns the filesystem path an artifact key maps to.
    #[must_use]
    pub fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
        self.config.base_path.join(key.as_str())
    }

    async fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_atomically(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        Self::ensure_parent_dirs(path).await?;

        let temp_path = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await?;

        let write_result = async {
            tokio::io::AsyncWriteExt::write_all(&mut file, data).await?;
            if self.config.sync_on_write {
                file.sync_all().await?;
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, path).await
    }
}

// -----------------------------------------------------------------------------
// Sink Implementation
// -----------------------------------------------------------------------------

#[async_trait]
impl Sink for FilesystemSink {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    async fn save(&self, artifact: &SealedArtifact) -> SinkResult<()> {
        let key = ArtifactKey::from_artifact(artifact);
        let path = self.artifact_path(&key);
        let payload = artifact.payload();

        self.write_atomically(&path, &payload)
            .await
            .map_err(|e| SinkError::WriteFailed {
                sink: self.kind(),
                key: key.as_str().to_string(),
                message: e.to_string(),
            })
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
