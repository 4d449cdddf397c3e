//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de cache y del resolver.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("vos_cache_hits_total", "Reads served from a fresh cache entry");
    metrics::describe_counter!("vos_cache_misses_total", "Reads that had to call the upstream");
    metrics::describe_counter!(
        "vos_cache_stale_fallbacks_total",
        "Reads served from an expired entry because the upstream failed"
    );
    metrics::describe_counter!(
        "vos_cache_evictions_total",
        "Total number of cache evictions"
    );
    metrics::describe_gauge!("vos_cache_entries", "Current number of entries in cache");
    metrics::describe_histogram!(
        "vos_cache_operation_seconds",
        "Time spent on cache operations"
    );
    metrics::describe_histogram!(
        "vos_upstream_request_seconds",
        "Latency of upstream calls made by the resolver"
    );
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos para consultar el hit rate sin el exporter.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    stale: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            stale: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self, api: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("vos_cache_hits_total", "api" => api.to_string()).increment(1);
    }

    /// Registra un cache miss (incluye force refresh)
    pub fn record_miss(&self, api: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("vos_cache_misses_total", "api" => api.to_string()).increment(1);
    }

    /// Registra una respuesta servida desde una entry expirada
    pub fn record_stale_fallback(&self, api: &str) {
        self.stale.fetch_add(1, Ordering::Relaxed);
        counter!("vos_cache_stale_fallbacks_total", "api" => api.to_string()).increment(1);
    }

    /// Registra una eviction
    pub fn record_eviction(&self, reason: &str) {
        counter!("vos_cache_evictions_total", "reason" => reason.to_string()).increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: u64) {
        gauge!("vos_cache_entries").set(count as f64);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &str, duration: Duration) {
        histogram!(
            "vos_cache_operation_seconds",
            "operation" => operation.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Registra la latencia de una llamada upstream
    pub fn record_upstream_latency(&self, api: &str, success: bool, duration: Duration) {
        histogram!(
            "vos_upstream_request_seconds",
            "api" => api.to_string(),
            "outcome" => if success { "success" } else { "failure" }
        )
        .record(duration.as_secs_f64());
    }

    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stale_fallbacks(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
