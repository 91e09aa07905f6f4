//! Amazon S3 object storage adapter
//!
//! Opens objects as a byte stream without buffering them in memory. Custom
//! endpoints (MinIO, LocalStack) are addressed path-style.

use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, Client};
use drivesync_core::{
    config::StorageConfig,
    ports::{IObjectStorage, StoredObject},
};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{
    sdk::{load_sdk_config, StaticCredentials},
    AwsError,
};

/// [`IObjectStorage`] backed by S3
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the adapter from the `storage` configuration section
    pub async fn from_config(config: &StorageConfig) -> Self {
        let credentials = StaticCredentials::from_parts(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
        );
        let sdk_config = load_sdk_config(
            &config.region,
            config.endpoint.as_deref(),
            credentials.as_ref(),
        )
        .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            path_style = config.force_path_style,
            "S3 storage adapter initialized"
        );
        Self::new(Client::from_conf(s3_config))
    }
}

/// Validates the declared object size
fn declared_length(bucket: &str, key: &str, content_length: Option<i64>) -> Result<u64, AwsError> {
    content_length
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            AwsError::InvalidResponse(format!("object {bucket}/{key} has no content length"))
        })
}

#[async_trait]
impl IObjectStorage for S3ObjectStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AwsError::GetObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;

        let content_length = declared_length(bucket, key, output.content_length)?;
        debug!(bucket, key, content_length, "Opened object");

        let body = ReaderStream::new(output.body.into_async_read()).boxed();
        Ok(StoredObject {
            content_length,
            body,
        })
    }
}
