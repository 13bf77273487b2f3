// src/registry/mod.rs

//! Dedupe registry: records which content hashes have already been
//! stored, with expiry.
//!
//! Key format mirrors the registry namespace convention:
//! `hash:{environment}:{dgroup}:{sha256}`. Entries carry the stored
//! object location, a registration timestamp, and the candidate's
//! metadata so operators can trace a hash back to its object.

mod memory;
#[cfg(feature = "redis")]
mod redis_backend;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::ContentHash;
use crate::models::MetadataValue;

pub use memory::MemoryRegistry;
#[cfg(feature = "redis")]
pub use redis_backend::RedisRegistry;

/// Record stored alongside a registered hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Object store location of the stored payload
    pub location: String,

    /// When the hash was registered
    pub registered_at: DateTime<Utc>,

    /// Candidate metadata plus version_id/etag from the store
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl RegistryRecord {
    pub fn new(location: impl Into<String>, metadata: BTreeMap<String, MetadataValue>) -> Self {
        Self {
            location: location.into(),
            registered_at: Utc::now(),
            metadata,
        }
    }
}

/// Build the registry key for a hash under a namespace.
pub(crate) fn registry_key(namespace: &str, hash: &ContentHash) -> String {
    format!("hash:{namespace}:{hash}")
}

/// External key-value store recording "this hash was already stored".
///
/// Best-effort dedupe, not a distributed lock: concurrent candidates
/// with identical content may both pass `exists` and both store.
#[async_trait]
pub trait DedupeRegistry: Send + Sync {
    /// Whether the hash is currently registered under the namespace.
    async fn exists(&self, namespace: &str, hash: &ContentHash) -> Result<bool>;

    /// Register the hash with a TTL and its record.
    async fn register(
        &self,
        namespace: &str,
        hash: &ContentHash,
        ttl: Duration,
        record: &RegistryRecord,
    ) -> Result<()>;
}
