use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, ProvideCredentials};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{config::Region, Client, Config as S3Config};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::domain::{
    config::ResolvedProviderConfig,
    provider::{DownloadResult, FileStream, Provider, ProviderError},
    stream::ChunkStream,
};

/// Storage provider backed by an S3 bucket (or any S3-compatible service).
#[derive(Clone)]
pub struct S3Provider {
    client: Client,
    bucket_name: String,
    prefix: String,
    presign_downloads: bool,
    presign_expiry: Duration,
}

impl S3Provider {
    /// Create an S3Provider from a resolved provider configuration
    pub async fn from_resolved(config: &ResolvedProviderConfig) -> Result<Self, ProviderError> {
        let bucket_name = config.bucket_name.clone().ok_or_else(|| {
            ProviderError::new(500, format!("provider '{}' has no bucket", config.name))
        })?;

        // Resolve region
        let region_chain =
            RegionProviderChain::first_try(config.region.as_ref().map(|r| Region::new(r.clone())))
                .or_default_provider();

        let region = region_chain.region().await.ok_or_else(|| {
            tracing::error!("AWS region must be set for provider '{}'", config.name);
            ProviderError::new(500, format!("no region for provider '{}'", config.name))
        })?;

        // Build credentials provider
        let credentials_provider: Arc<dyn ProvideCredentials> =
            match (&config.access_key_id, &config.secret_access_key) {
                (Some(access_key_id), Some(secret_access_key)) => Arc::new(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    config.session_token.clone(),
                    None,
                    "streamgate",
                )),
                _ => Arc::new(
                    DefaultCredentialsChain::builder()
                        .region(region.clone())
                        .build()
                        .await,
                ),
            };

        let mut s3_config_builder = S3Config::builder()
            .behavior_version_latest()
            .region(region)
            .credentials_provider(credentials_provider)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(config.timeout))
                    .build(),
            );

        // Configure for custom S3-compatible endpoints (MinIO, Hetzner, etc.)
        if let Some(endpoint_url) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style addressing if configured (required for MinIO and some S3-compatible services)
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            bucket_name,
            prefix: config.prefix.clone(),
            presign_downloads: config.presign_downloads,
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        })
    }

    /// Build the full object key with prefix
    fn build_key(prefix: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", prefix, path)
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(false),
                other => {
                    tracing::error!("S3 head_object failed: {:?}", other);
                    Err(ProviderError::new(500, "storage operation failed"))
                }
            },
        }
    }

    async fn presigned_url(&self, key: &str) -> Result<String, ProviderError> {
        let presigning = PresigningConfig::expires_in(self.presign_expiry).map_err(|e| {
            tracing::error!("invalid presign expiry: {:?}", e);
            ProviderError::new(500, "storage operation failed")
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                tracing::error!("S3 presign failed: {:?}", e);
                ProviderError::new(500, "storage operation failed")
            })?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl Provider for S3Provider {
    async fn download(
        &self,
        path: &str,
        accept_url: bool,
    ) -> Result<DownloadResult, ProviderError> {
        let key = Self::build_key(&self.prefix, path);

        if accept_url && self.presign_downloads {
            // The presigned URL is issued regardless of whether the key
            // exists, so probe first to keep missing objects a clean 404.
            if !self.exists(&key).await? {
                return Err(ProviderError::not_found(path));
            }
            let url = self.presigned_url(&key).await?;
            return Ok(DownloadResult::Redirect(url));
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => ProviderError::not_found(path),
                other => {
                    tracing::error!("S3 get_object failed: {:?}", other);
                    ProviderError::new(500, "storage operation failed")
                }
            })?;

        let content_type = result
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let size = result.content_length().and_then(|l| u64::try_from(l).ok());

        // Direct streaming - no buffering
        Ok(DownloadResult::File(FileStream {
            reader: Box::new(result.body.into_async_read()),
            content_type,
            size,
        }))
    }

    async fn upload(
        &self,
        stream: ChunkStream,
        path: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let key = Self::build_key(&self.prefix, path);

        // Adapt the chunk stream into an SDK body without buffering, counting
        // bytes on the way through so the result can report the stored size.
        let total = Arc::new(AtomicU64::new(0));
        let counter = total.clone();
        let frame_stream = stream.map(move |result| {
            result
                .map(|bytes| {
                    counter.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    hyper::body::Frame::data(bytes)
                })
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        });

        let stream_body = http_body_util::StreamBody::new(frame_stream);
        let boxed_body = http_body_util::combinators::BoxBody::new(stream_body);
        let byte_stream = aws_sdk_s3::primitives::ByteStream::from_body_1_x(boxed_body);

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(byte_stream)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 put_object failed: {:?}", e);
                ProviderError::new(500, "upload failed")
            })?;

        let name = path.rsplit('/').next().unwrap_or(path);
        Ok(serde_json::json!({
            "name": name,
            "path": path,
            "kind": "file",
            "size": total.load(Ordering::Relaxed),
            "etag": result.e_tag(),
        }))
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let key = Self::build_key(&self.prefix, path);

        // S3 deletes are silently idempotent; surface a 404 instead.
        if !self.exists(&key).await? {
            return Err(ProviderError::not_found(path));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 delete_object failed: {:?}", e);
                ProviderError::new(500, "storage operation failed")
            })?;

        Ok(())
    }

    /// Test bucket connectivity by performing a list_objects_v2 operation.
    /// This verifies that credentials are valid and the bucket is accessible.
    async fn check(&self) -> Result<(), ProviderError> {
        tracing::debug!("Testing connection to bucket: {}", self.bucket_name);

        self.client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .max_keys(1) // Only need to list one object to verify connectivity
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to connect to bucket '{}': {:?}",
                    self.bucket_name,
                    e
                );
                ProviderError::new(500, format!("bucket '{}' unreachable", self.bucket_name))
            })?;

        tracing::info!("Successfully connected to bucket: {}", self.bucket_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key_with_prefix() {
        assert_eq!(S3Provider::build_key("ci", "abc/def.txt"), "ci/abc/def.txt");
    }

    #[test]
    fn test_build_key_without_prefix() {
        assert_eq!(S3Provider::build_key("", "abc/def.txt"), "abc/def.txt");
    }

    #[test]
    fn test_build_key_strips_leading_slash() {
        assert_eq!(S3Provider::build_key("ci", "/abc.txt"), "ci/abc.txt");
        assert_eq!(S3Provider::build_key("", "/abc.txt"), "abc.txt");
    }
}
