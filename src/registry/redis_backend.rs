// src/registry/redis_backend.rs

//! Redis-backed dedupe registry.
//!
//! Entries are JSON-serialized [`RegistryRecord`]s stored with `SET EX`
//! so expiry is enforced server-side.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::{AppError, Result};
use crate::hash::ContentHash;

use super::{registry_key, DedupeRegistry, RegistryRecord};

/// Registry backed by a Redis instance shared across scraper runs.
pub struct RedisRegistry {
    client: redis::Client,
}

impl RedisRegistry {
    /// Connect lazily to the given Redis URL, e.g.
    /// `redis://localhost:6379/0`.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(AppError::registry)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(AppError::registry)
    }
}

#[async_trait]
impl DedupeRegistry for RedisRegistry {
    async fn exists(&self, namespace: &str, hash: &ContentHash) -> Result<bool> {
        let key = registry_key(namespace, hash);
        let mut conn = self.connection().await?;
        conn.exists(&key).await.map_err(AppError::registry)
    }

    async fn register(
        &self,
        namespace: &str,
        hash: &ContentHash,
        ttl: Duration,
        record: &RegistryRecord,
    ) -> Result<()> {
        let key = registry_key(namespace, hash);
        let payload = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(&key, payload, ttl.as_secs())
            .await
            .map_err(AppError::registry)?;
        Ok(())
    }
}
