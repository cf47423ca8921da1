use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{detect_content_type, ObjectStore, StoreError, StoredObject};
use crate::config::StorageConfig;

/// Object store backed by an S3 bucket (or any S3-compatible endpoint)
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .context("storage.bucket is required for the s3 backend")?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "medportal-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        let public_base_url = match (&config.public_base_url, &config.endpoint) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", bucket, config.region),
        };

        Ok(Self {
            client,
            bucket,
            public_base_url,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn store(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> Result<StoredObject, StoreError> {
        let content_type = detect_content_type(key, content_type);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;

        debug!(bucket = %self.bucket, key = %key, size, content_type = %content_type, "Uploaded object to S3");

        Ok(StoredObject {
            url: format!("{}/{}", self.public_base_url, key),
            id: key.to_string(),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| StoreError::Delete(e.to_string()))?;

        debug!(bucket = %self.bucket, key = %id, "Deleted object from S3");
        Ok(())
    }
}
