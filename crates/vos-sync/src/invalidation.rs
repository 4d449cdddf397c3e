//! Hook through which completed jobs invalidate overlapping cache entries.

use async_trait::async_trait;
use vos_core::InstanceId;

/// Removes cached responses that a completed job made obsolete.
#[async_trait]
pub trait CacheInvalidation: Send + Sync {
    /// Removes every cached entry of `instance` for the given resource
    /// paths. Returns the number of entries removed.
    async fn invalidate_resources(&self, instance: InstanceId, resource_paths: &[&str]) -> usize;
}

/// Invalidation hook for deployments without a response cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidation;

#[async_trait]
impl CacheInvalidation for NoopInvalidation {
    async fn invalidate_resources(&self, _instance: InstanceId, _resource_paths: &[&str]) -> usize {
        0
    }
}
