// src/registry/memory.rs

//! In-memory dedupe registry for tests and single-process runs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::hash::ContentHash;

use super::{registry_key, DedupeRegistry, RegistryRecord};

struct Entry {
    expires_at: Instant,
    record: RegistryRecord,
}

/// Process-local registry backed by a hash map with lazy expiry.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Look up the record for a hash, if registered and unexpired.
    pub async fn get(&self, namespace: &str, hash: &ContentHash) -> Option<RegistryRecord> {
        let key = registry_key(namespace, hash);
        let entries = self.entries.lock().await;
        entries
            .get(&key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.record.clone())
    }
}

#[async_trait]
impl DedupeRegistry for MemoryRegistry {
    async fn exists(&self, namespace: &str, hash: &ContentHash) -> Result<bool> {
        Ok(self.get(namespace, hash).await.is_some())
    }

    async fn register(
        &self,
        namespace: &str,
        hash: &ContentHash,
        ttl: Duration,
        record: &RegistryRecord,
    ) -> Result<()> {
        let key = registry_key(namespace, hash);
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Entry {
                expires_at: Instant::now() + ttl,
                record: record.clone(),
            },
        );
        Ok(())
    }
}
