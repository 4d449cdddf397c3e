//! Response cache.
//!
//! Upstream responses are cached per (instance, resource path, normalized
//! parameters). Stores keep entries past their TTL tier so the resolver can
//! fall back to them when the upstream is down; freshness is decided by the
//! resolver, never by the store.

pub mod invalidation;
pub mod memory;
pub mod sqlite;
pub mod stats;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;
use vos_core::{Clock, TtlPolicy};

// Re-exports
pub use invalidation::{InvalidationResult, KeyPattern, PathMatch, StoreInvalidation};
pub use memory::{MemoryCacheConfig, MemoryStore};
pub use sqlite::SqliteStore;
pub use stats::{ApiCount, CacheStats, GRACE_PERIOD, collect_stats, purge_expired};
pub use store::{CacheEntry, CacheError, CacheStore};

/// Runs [`purge_expired`] every `every` until the returned task is aborted.
pub fn spawn_purge_task(
    store: Arc<dyn CacheStore>,
    policy: Arc<TtlPolicy>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(every);
        // First tick fires immediately
        timer.tick().await;
        loop {
            timer.tick().await;
            if let Err(e) = purge_expired(store.as_ref(), &policy, clock.now(), GRACE_PERIOD).await {
                warn!(error = %e, "Cache purge failed");
            }
        }
    })
}
