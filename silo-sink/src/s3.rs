//! S3-compatible object store sink.
//!
//! Uploads each artifact's payload to
//! `{prefix}{topic}/{partition:06}/{first_offset:020}` with the artifact's
//! MD5 as Content-MD5, so the store verifies the upload against the
//! checksum computed while the batch accumulated. Re-uploading the same
//! key with the same bytes is idempotent.
//!
//! Works against AWS S3 and S3-compatible services (`MinIO`,
//! `LocalStack`) via a custom endpoint with path-style addressing.

use std::env;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use silo_buffer::SealedArtifact;
use tracing::info;

use crate::error::{SinkError, SinkResult};
use crate::sink::{ArtifactKey, Sink};

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for the S3 sink.
#[derive(Debug, Clone, Default)]
pub struct S3SinkConfig {
    /// Bucket name (required).
    pub bucket: String,

    /// Key prefix for all artifacts. Empty means bucket root.
    pub key_prefix: String,

    /// AWS region. Falls back to the environment's default region.
    pub region: Option<String>,

    /// Custom endpoint URL for S3-compatible services.
    pub endpoint_url: Option<String>,

    /// Force path-style addressing (required for `MinIO`/`LocalStack`).
    pub force_path_style: bool,
}

impl S3SinkConfig {
    /// Creates a configuration for the given bucket.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Parses an `s3://bucket/prefix` URL into a configuration.
    ///
    /// # Errors
    /// Returns an error if the URL has the wrong scheme or no bucket.
    pub fn from_url(url: &str) -> SinkResult<Self> {
        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| SinkError::InvalidConfig {
                reason: format!("object store URL must start with s3://, got '{url}'"),
            })?;

        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(SinkError::InvalidConfig {
                reason: format!("object store URL '{url}' has no bucket"),
            });
        }

        let key_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        Ok(Self {
            bucket: bucket.to_string(),
            key_prefix,
            ..Self::default()
        })
    }

    /// Loads optional overrides from the environment.
    ///
    /// - `SILO_S3_REGION`: AWS region
    /// - `SILO_S3_ENDPOINT`: custom endpoint URL
    /// - `SILO_S3_FORCE_PATH_STYLE`: `"true"` for path-style addressing
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(region) = env::var("SILO_S3_REGION") {
            self.region = Some(region);
        }
        if let Ok(endpoint) = env::var("SILO_S3_ENDPOINT") {
            self.endpoint_url = Some(endpoint);
        }
        if let Ok(v) = env::var("SILO_S3_FORCE_PATH_STYLE") {
            self.force_path_style = v.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets a custom endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint.into());
        self
    }
}

// -----------------------------------------------------------------------------
// S3Sink
// -----------------------------------------------------------------------------

/// Sink that uploads artifacts to an S3-compatible object store.
#[derive(Clone)]
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    config: S3SinkConfig,
}

impl S3Sink {
    /// Creates an S3 sink, loading credentials from the standard AWS
    /// credential chain.
    ///
    /// # Errors
    /// Returns an error if the bucket name is empty.
    pub async fn new(config: S3SinkConfig) -> SinkResult<Self> {
        if config.bucket.is_empty() {
            return Err(SinkError::InvalidConfig {
                reason: "bucket name must not be empty".to_string(),
            });
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let aws_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        info!(bucket = %config.bucket, prefix = %config.key_prefix, "s3 sink ready");
        Ok(Self { client, config })
    }

    /// Creates a sink from an existing SDK client, for tests with a
    /// pre-configured client.
    ///
    /// # Errors
    /// Returns an error if the bucket name is empty.
    pub fn from_client(client: aws_sdk_s3::Client, config: S3SinkConfig) -> SinkResult<Self> {
        if config.bucket.is_empty() {
            return Err(SinkError::InvalidConfig {
                reason: "bucket name must not be empty".to_string(),
            });
        }
        Ok(Self { client, config })
    }

    fn full_key(&self, key: &ArtifactKey) -> String {
        format!("{}{}", self.config.key_prefix, key.as_str())
    }
}

// -----------------------------------------------------------------------------
// Sink Implementation
// -----------------------------------------------------------------------------

#[async_trait]
impl Sink for S3Sink {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn save(&self, artifact: &SealedArtifact) -> SinkResult<()> {
        let key = ArtifactKey::from_artifact(artifact);
        let full_key = self.full_key(&key);
        let md5_base64 = BASE64.encode(artifact.digest().as_bytes());

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&full_key)
            .body(ByteStream::from(artifact.payload()))
            .content_type("application/octet-stream")
            .content_md5(md5_base64)
            .metadata("records", artifact.record_count().to_string())
            .send()
            .await
            .map_err(|e| SinkError::WriteFailed {
                sink: self.kind(),
                key: full_key.clone(),
                message: format!("S3 PutObject failed: {e}"),
            })?;

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_bucket_only() {
        let config = S3SinkConfig::from_url("s3://archive").unwrap();
        assert_eq!(config.bucket, "archive");
        assert_eq!(config.key_prefix, "");
    }

    #[test]
    fn test_from_url_with_prefix() {
        let config = S3SinkConfig::from_url("s3://archive/streams/prod/").unwrap();
        assert_eq!(config.bucket, "archive");
        assert_eq!(config.key_prefix, "streams/prod/");
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        assert!(S3SinkConfig::from_url("gs://bucket").is_err());
        assert!(S3SinkConfig::from_url("s3://").is_err());
    }
}
