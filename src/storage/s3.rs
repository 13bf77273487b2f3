// src/storage/s3.rs

//! AWS S3 object store implementation.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use log::debug;

use crate::error::{AppError, Result};

use super::{ObjectStore, PutReceipt};

/// S3-backed object store.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a new S3 store for a bucket.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a store from the default AWS credential chain.
    pub async fn from_default_config(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: &[u8], content_encoding: &str) -> Result<PutReceipt> {
        let location = self.location(key);
        debug!("Uploading {} bytes to {}", body.len(), location);

        let response = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .content_encoding(content_encoding)
            .send()
            .await
            .map_err(|e| AppError::storage(&location, e.into_service_error()))?;

        Ok(PutReceipt {
            version_id: response.version_id().unwrap_or_default().to_string(),
            etag: response
                .e_tag()
                .unwrap_or_default()
                .trim_matches('"')
                .to_string(),
            location,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::storage(self.location(key), service_err))
                }
            }
        }
    }
}
