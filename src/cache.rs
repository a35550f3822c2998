//! Thin get/set/delete shim over a key-value store.
//!
//! Cache trouble never fails a request: every helper logs and reports a miss instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .context("Failed to create Redis pool")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;
        let value: Option<String> = conn.get(key).await.context("Redis GET failed")?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs as _)
            .await
            .context("Redis SETEX failed")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;
        conn.del::<_, ()>(key).await.context("Redis DEL failed")?;
        Ok(())
    }
}

/// Returns the decoded value, or `None` on a miss, a backend failure or undecodable data.
pub async fn cache_get<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "cache miss");
            return None;
        }
        Err(e) => {
            warn!(error = %e, key, "cache get failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => {
            debug!(key, "cache hit");
            Some(value)
        }
        Err(e) => {
            warn!(error = %e, key, "cached value could not be decoded");
            None
        }
    }
}

pub async fn cache_set<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl_secs: u64) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, key, "value could not be encoded for cache");
            return;
        }
    };
    if let Err(e) = cache.set_ex(key, raw, ttl_secs).await {
        warn!(error = %e, key, "cache set failed");
    }
}

pub async fn cache_delete(cache: &dyn Cache, key: &str) {
    if let Err(e) = cache.delete(key).await {
        warn!(error = %e, key, "cache delete failed");
    }
}
