// src/notify/mod.rs

//! Downstream notification contract.
//!
//! When a payload is stored, an optional sink publishes a message so
//! downstream consumers can pick it up. Publishing is fire-and-forget:
//! the collector logs sink failures and never fails the candidate over
//! them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::ContentHash;
use crate::models::{Candidate, CollectorConfig, MetadataValue};
use crate::storage::PutReceipt;

/// Message published after a payload is stored and registered.
///
/// The metadata map carries the candidate's own metadata plus the
/// standard publication fields (`publish_dtm`, `url`,
/// `original_file_size`, `original_file_md5sum`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub dataset: String,
    pub environment: String,
    /// Identifier without the compression suffix
    pub urn: String,
    /// Object store location of the compressed payload
    pub location: String,
    /// Publication version timestamp, `%Y%m%dT%H%M%SZ`
    pub version: String,
    pub etag: String,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Notification {
    /// Build the message for a stored candidate.
    pub fn for_stored(
        config: &CollectorConfig,
        candidate: &Candidate,
        receipt: &PutReceipt,
        content_hash: &ContentHash,
        original_size: usize,
    ) -> Self {
        let now = Utc::now();
        let mut metadata = candidate.metadata.clone();
        metadata.insert(
            "publish_dtm".into(),
            MetadataValue::Text(format!("{}Z", now.format("%Y-%m-%dT%H:%M:%S%.6f"))),
        );
        metadata.insert(
            "url".into(),
            MetadataValue::Text(candidate.request.url.clone()),
        );
        metadata.insert(
            "original_file_size".into(),
            MetadataValue::Integer(original_size as i64),
        );
        metadata.insert(
            "original_file_md5sum".into(),
            MetadataValue::Text(content_hash.as_str().to_string()),
        );

        Self {
            dataset: config.dgroup.clone(),
            environment: config.environment.to_string(),
            urn: candidate.urn().to_string(),
            location: receipt.location.clone(),
            version: now.format("%Y%m%dT%H%M%SZ").to_string(),
            etag: receipt.etag.clone(),
            metadata,
        }
    }

    /// Partition key for the message: `{dataset}:{urn}`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.dataset, self.urn)
    }
}

/// Optional pub/sub publisher consumed by the collector.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, message: &Notification) -> Result<()>;
}

/// Sink that logs messages instead of publishing them.
///
/// Stands in for a broker in development environments.
#[derive(Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, message: &Notification) -> Result<()> {
        info!(
            "Notification {}: stored at {} (etag {})",
            message.key(),
            message.location,
            message.etag
        );
        Ok(())
    }
}
