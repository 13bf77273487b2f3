// src/storage/local.rs

//! Local filesystem object store.
//!
//! Mirrors the key layout of the remote store under a root directory.
//! Used for development runs and tests; version identifiers are write
//! timestamps and the etag is the content hash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use crate::error::{AppError, Result};
use crate::hash::ContentHash;

use super::{ObjectStore, PutReceipt};

/// Filesystem-backed object store rooted at a directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn location(&self, key: &str) -> String {
        format!("file://{}", self.object_path(key).display())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, body: &[u8], _content_encoding: &str) -> Result<PutReceipt> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(self.location(key), e))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::storage(self.location(key), e))?;

        debug!("Wrote {} bytes to {}", body.len(), path.display());

        Ok(PutReceipt {
            location: self.location(key),
            version_id: Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string(),
            etag: ContentHash::of(body).as_str().to_string(),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }
}
