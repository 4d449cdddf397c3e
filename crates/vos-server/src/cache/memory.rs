//! In-memory cache store using Moka.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use vos_core::{CacheKey, InstanceId, TtlTier};

use super::invalidation::{InvalidationResult, KeyPattern};
use super::stats::GRACE_PERIOD;
use super::store::{CacheEntry, CacheError, CacheStore};
use crate::metrics::CacheMetrics;

/// Configuracion del cache en memoria.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximo numero de entries (default: 100000)
    pub max_capacity: u64,
    /// Tiempo que una entry se conserva tras escribirse. Debe superar el tier
    /// mas largo mas el periodo de gracia: las entries expiradas sirven de
    /// respaldo y las que pasan la gracia las cuenta y borra el purge.
    pub retention: Duration,
}

/// Tier mas largo + gracia + una hora de margen para el purge.
pub fn default_retention() -> Duration {
    let longest = TtlTier::ALL.iter().map(|t| t.duration()).max().unwrap_or_default();
    longest + GRACE_PERIOD + Duration::from_secs(3600)
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            retention: default_retention(),
        }
    }
}

/// Cache de respuestas usando Moka.
/// Thread-safe y async-friendly.
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use vos_core::{CacheKey, InstanceId, TtlTier};
/// use vos_server::cache::{CacheEntry, CacheStore, MemoryCacheConfig, MemoryStore};
/// use vos_server::metrics::CacheMetrics;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), vos_server::cache::CacheError> {
/// let store = MemoryStore::new(MemoryCacheConfig::default(), CacheMetrics::new());
/// let key = CacheKey::new(InstanceId::new(1), "GetAllCustomers", &json!({}));
///
/// store.put(CacheEntry::new(key.clone(), json!({"retCode": 0}), chrono::Utc::now())).await?;
/// assert!(store.get(&key).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Cache<CacheKey, CacheEntry>,
    metrics: CacheMetrics,
}

impl MemoryStore {
    /// Crea un nuevo cache con la configuracion dada.
    pub fn new(config: MemoryCacheConfig, metrics: CacheMetrics) -> Self {
        let eviction_metrics = metrics.clone();
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.retention)
            .eviction_listener(move |_key, _value, cause| {
                let reason = match cause {
                    moka::notification::RemovalCause::Expired => "retention",
                    moka::notification::RemovalCause::Size => "capacity",
                    moka::notification::RemovalCause::Explicit => "manual",
                    moka::notification::RemovalCause::Replaced => "replaced",
                };
                eviction_metrics.record_eviction(reason);
            })
            .build();

        Self { inner, metrics }
    }

    /// Retorna el numero aproximado de entries en cache.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Fuerza las tareas pendientes de Moka (conteos y evictions).
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }

    fn update_entry_gauge(&self) {
        self.metrics.update_entry_count(self.inner.entry_count());
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let start = Instant::now();
        let entry = self.inner.get(key).await;
        self.metrics.record_operation_duration("get", start.elapsed());
        Ok(entry)
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let start = Instant::now();
        self.inner.insert(entry.key.clone(), entry).await;
        self.metrics.record_operation_duration("put", start.elapsed());
        self.update_entry_gauge();
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.inner.remove(key).await.is_some())
    }

    async fn invalidate(&self, pattern: &KeyPattern) -> Result<InvalidationResult, CacheError> {
        let Some(glob) = pattern.compile() else {
            return Ok(InvalidationResult {
                count: 0,
                patterns: vec![pattern.to_string()],
            });
        };

        let matching: Vec<CacheKey> = self
            .inner
            .iter()
            .filter(|(key, _)| glob.matches(&key.to_string()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &matching {
            self.inner.invalidate(key).await;
        }
        self.update_entry_gauge();

        Ok(InvalidationResult {
            count: matching.len(),
            patterns: vec![pattern.to_string()],
        })
    }

    async fn entries(&self, instance: Option<InstanceId>) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self
            .inner
            .iter()
            .filter(|(key, _)| instance.is_none_or(|id| key.instance() == id))
            .map(|(_, entry)| entry)
            .collect())
    }
}
