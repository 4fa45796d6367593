//! R2 client implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tracing::{debug, info, warn};

use crate::blob::{report, BlobStore, CancelSignal, ProgressFn};
use crate::error::{StorageError, StorageResult};

/// Objects above this size go through multipart upload, one part per chunk.
pub const MULTIPART_PART_SIZE: usize = 8 * 1024 * 1024;

/// Longest validity S3 accepts for a presigned URL.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 3600;

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL (custom domain / r2.dev). Presigned URLs are used when unset.
    pub public_base_url: Option<String>,
    /// Presigned URL lifetime
    pub presign_ttl: Duration,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let presign_secs = std::env::var("R2_PRESIGN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(MAX_PRESIGN_SECS)
            .min(MAX_PRESIGN_SECS);

        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            presign_ttl: Duration::from_secs(presign_secs),
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
    presign_ttl: Duration,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config
                .public_base_url
                .map(|u| u.trim_end_matches('/').to_string()),
            presign_ttl: config.presign_ttl,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Generate a presigned URL for GET.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::config_error(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }

    async fn put_single(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cancel: &CancelSignal,
    ) -> StorageResult<()> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::cancelled(key)),
            res = request => res
                .map(|_| ())
                .map_err(|e| StorageError::upload_failed(e.to_string())),
        }
    }

    async fn put_multipart(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: &Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> StorageResult<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::upload_failed("multipart upload has no id"))?
            .to_string();

        let result = self
            .upload_parts(key, &upload_id, &bytes, progress, cancel)
            .await;

        let parts = match result {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(e);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            self.abort_multipart(key, &upload_id).await;
            return Err(StorageError::upload_failed(e.to_string()));
        }

        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        bytes: &[u8],
        progress: &Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> StorageResult<Vec<CompletedPart>> {
        let total = bytes.len() as u64;
        let mut sent = 0u64;
        let mut parts = Vec::new();

        for (idx, chunk) in bytes.chunks(MULTIPART_PART_SIZE).enumerate() {
            if cancel.is_cancelled() {
                return Err(StorageError::cancelled(key));
            }

            let part_number = idx as i32 + 1;
            let request = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send();

            let uploaded = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StorageError::cancelled(key)),
                res = request => res.map_err(|e| StorageError::upload_failed(e.to_string()))?,
            };

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            sent += chunk.len() as u64;
            report(progress, sent, total);
            debug!(key, part_number, sent, total, "Uploaded part");
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(key, "Failed to abort multipart upload: {}", e);
        }
    }
}

#[async_trait]
impl BlobStore for R2Client {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if cancel.is_cancelled() {
            return Err(StorageError::cancelled(key));
        }

        let total = bytes.len() as u64;
        debug!("Uploading {} bytes to {}", total, key);

        if bytes.len() > MULTIPART_PART_SIZE {
            self.put_multipart(key, bytes, content_type, &progress, cancel)
                .await?;
        } else {
            self.put_single(key, bytes, content_type, cancel).await?;
            report(&progress, total, total);
        }

        metrics::counter!("r2_bytes_uploaded_total").increment(total);
        info!("Uploaded {} ({} bytes)", key, total);
        self.url(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    async fn url(&self, key: &str) -> StorageResult<String> {
        match &self.public_base_url {
            Some(base) => Ok(format!("{}/{}", base, key)),
            None => self.presign_get(key, self.presign_ttl).await,
        }
    }
}
