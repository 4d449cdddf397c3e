//! Cache invalidation with pattern matching support.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;
use tracing::{debug, info, warn};
use vos_core::{CacheKey, InstanceId, paths};
use vos_sync::CacheInvalidation;

use super::store::CacheStore;

/// Resultado de una operación de invalidación.
#[derive(Debug, Clone, Default)]
pub struct InvalidationResult {
    /// Número de entries invalidadas.
    pub count: usize,
    /// Patrones aplicados.
    pub patterns: Vec<String>,
}

impl InvalidationResult {
    pub fn merge(&mut self, other: InvalidationResult) {
        self.count += other.count;
        self.patterns.extend(other.patterns);
    }
}

/// Resource-path part of a [`KeyPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    Any,
    Exact(String),
    Prefix(String),
}

/// Selects cache entries by instance and resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    pub instance: Option<InstanceId>,
    pub path: PathMatch,
}

impl KeyPattern {
    /// Every entry of every instance.
    pub fn all() -> Self {
        Self {
            instance: None,
            path: PathMatch::Any,
        }
    }

    /// Every entry of one instance.
    pub fn instance(instance: InstanceId) -> Self {
        Self {
            instance: Some(instance),
            path: PathMatch::Any,
        }
    }

    /// Every parameter set of one resource path on one instance.
    pub fn resource(instance: InstanceId, resource_path: &str) -> Self {
        Self {
            instance: Some(instance),
            path: PathMatch::Exact(paths::normalize(resource_path)),
        }
    }

    /// Resource paths of one instance starting with `prefix`.
    pub fn prefix(instance: InstanceId, prefix: &str) -> Self {
        let normalized = paths::normalize(prefix);
        Self {
            instance: Some(instance),
            path: PathMatch::Prefix(normalized),
        }
    }

    /// Glob over the `instance:path:params` display form of a key.
    pub fn glob(&self) -> String {
        let instance = self
            .instance
            .map(|i| i.to_string())
            .unwrap_or_else(|| "*".to_string());
        match &self.path {
            PathMatch::Any => format!("{}:*", instance),
            PathMatch::Exact(path) => format!("{}:{}:*", instance, Pattern::escape(path)),
            PathMatch::Prefix(prefix) => format!("{}:{}*", instance, Pattern::escape(prefix)),
        }
    }

    /// Compiled glob, or `None` when the pattern text is not a valid glob.
    pub fn compile(&self) -> Option<Pattern> {
        let text = self.glob();
        match Pattern::new(&text) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                debug!(pattern = %text, error = %e, "Invalid glob pattern");
                None
            },
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        if let Some(instance) = self.instance
            && key.instance() != instance
        {
            return false;
        }
        match &self.path {
            PathMatch::Any => true,
            PathMatch::Exact(path) => key.resource_path() == path,
            PathMatch::Prefix(prefix) => key.resource_path().starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob())
    }
}

/// Connects completed sync jobs to the cache store.
pub struct StoreInvalidation {
    store: Arc<dyn CacheStore>,
}

impl StoreInvalidation {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheInvalidation for StoreInvalidation {
    async fn invalidate_resources(&self, instance: InstanceId, resource_paths: &[&str]) -> usize {
        let mut total = InvalidationResult::default();
        for path in resource_paths {
            match self.store.invalidate(&KeyPattern::resource(instance, path)).await {
                Ok(result) => total.merge(result),
                Err(e) => warn!(
                    instance = %instance,
                    resource_path = %path,
                    error = %e,
                    "Cache invalidation after sync failed"
                ),
            }
        }

        info!(
            instance = %instance,
            count = total.count,
            "Cache entries invalidated after sync"
        );
        total.count
    }
}
