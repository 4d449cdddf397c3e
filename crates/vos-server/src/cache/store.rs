//! Cache store abstraction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use vos_core::{CacheKey, InstanceId, VosError, ttl};

use super::invalidation::{InvalidationResult, KeyPattern};

/// Error del sistema de cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(String),

    #[error("corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl CacheError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<CacheError> for VosError {
    fn from(err: CacheError) -> Self {
        VosError::Storage(err.to_string())
    }
}

/// A cached upstream response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Arc<Value>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, payload: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key,
            payload: Arc::new(payload),
            fetched_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        ttl::age(self.fetched_at, now)
    }
}

/// Keyed storage of upstream responses.
///
/// Stores never evaluate freshness; `get` returns whatever is stored, however
/// old. `put` replaces the whole entry for its key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes one entry. Returns whether it existed.
    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Removes every entry matching `pattern`.
    async fn invalidate(&self, pattern: &KeyPattern) -> Result<InvalidationResult, CacheError>;

    /// Snapshot of stored entries, optionally for one instance.
    async fn entries(&self, instance: Option<InstanceId>) -> Result<Vec<CacheEntry>, CacheError>;
}
