//! Read path: cache first, upstream on miss, stale entry when the upstream fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use vos_core::{
    CacheKey, Clock, DataSource, InstanceId, InstanceRegistry, Result, TtlPolicy, VosError,
    VosInstance, paths,
};
use vos_upstream::{Upstream, UpstreamConnector, UpstreamRequest};

use crate::cache::{CacheEntry, CacheStore};
use crate::metrics::CacheMetrics;

/// What a read does when its instance is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledPolicy {
    /// Fail with `InstanceDisabled`.
    #[default]
    Reject,
    /// Serve whatever is cached, without contacting the upstream.
    CacheOnly,
}

/// Outcome of a resolved read.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub payload: Arc<Value>,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
    /// Served from an entry past its lifetime.
    pub stale: bool,
    /// Upstream failure masked by a stale entry.
    pub warning: Option<String>,
}

impl Resolution {
    fn cached(entry: CacheEntry, stale: bool, warning: Option<String>) -> Self {
        Self {
            payload: entry.payload,
            source: DataSource::Cache,
            fetched_at: entry.fetched_at,
            stale,
            warning,
        }
    }
}

/// Resolves reads against the cache and the upstream instances.
pub struct FreshnessResolver {
    registry: Arc<InstanceRegistry>,
    connector: Arc<dyn UpstreamConnector>,
    store: Arc<dyn CacheStore>,
    policy: Arc<TtlPolicy>,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
    disabled_policy: DisabledPolicy,
    upstreams: Mutex<HashMap<InstanceId, Arc<dyn Upstream>>>,
}

impl FreshnessResolver {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        store: Arc<dyn CacheStore>,
        policy: Arc<TtlPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            connector,
            store,
            policy,
            clock,
            metrics: CacheMetrics::new(),
            disabled_policy: DisabledPolicy::default(),
            upstreams: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_disabled_policy(mut self, policy: DisabledPolicy) -> Self {
        self.disabled_policy = policy;
        self
    }

    pub fn policy(&self) -> &Arc<TtlPolicy> {
        &self.policy
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Client for an instance, built once and reused.
    pub fn upstream(&self, instance: &VosInstance) -> Result<Arc<dyn Upstream>> {
        if let Some(upstream) = self.upstreams.lock().get(&instance.id) {
            return Ok(Arc::clone(upstream));
        }
        let upstream = self
            .connector
            .connect(instance)
            .map_err(|e| e.into_vos(instance.id))?;
        self.upstreams
            .lock()
            .insert(instance.id, Arc::clone(&upstream));
        Ok(upstream)
    }

    /// Resolves one read.
    ///
    /// Without `force_refresh` a fresh entry (`age < lifetime`) is returned
    /// as is. Otherwise the upstream is called once; on success the payload
    /// replaces the entry, on failure any existing entry is returned marked
    /// stale, and only when there is none does the failure propagate.
    #[instrument(skip_all, fields(instance = %instance_id, resource_path = %resource_path, force_refresh = force_refresh))]
    pub async fn resolve(
        &self,
        instance_id: InstanceId,
        resource_path: &str,
        params: &Value,
        force_refresh: bool,
    ) -> Result<Resolution> {
        let instance = self.registry.require(instance_id)?;
        let key = CacheKey::new(instance_id, resource_path, params);
        let api = paths::api_name(key.resource_path()).to_string();

        if !instance.enabled {
            return self.resolve_disabled(&key, &api, force_refresh).await;
        }

        let existing = self.lookup(&key).await;
        let now = self.clock.now();

        if !force_refresh
            && let Some(entry) = &existing
            && self.policy.is_fresh(key.resource_path(), entry.fetched_at, now)
        {
            self.metrics.record_hit(&api);
            debug!(key = %key.digest(), "Cache hit");
            return Ok(Resolution::cached(entry.clone(), false, None));
        }

        self.metrics.record_miss(&api);
        let upstream = self.upstream(&instance)?;
        let request = UpstreamRequest::new(key.resource_path(), key.params_value());

        let start = Instant::now();
        let outcome = upstream.call(&request).await;
        self.metrics
            .record_upstream_latency(&api, outcome.is_ok(), start.elapsed());

        match outcome {
            Ok(payload) => {
                let entry = CacheEntry::new(key, payload, self.clock.now());
                let resolution = Resolution {
                    payload: Arc::clone(&entry.payload),
                    source: DataSource::Upstream,
                    fetched_at: entry.fetched_at,
                    stale: false,
                    warning: None,
                };
                if let Err(e) = self.store.put(entry).await {
                    warn!(error = %e, "Failed to store upstream response");
                }
                Ok(resolution)
            },
            Err(e) => {
                let err = e.into_vos(instance_id);
                match existing {
                    Some(entry) => {
                        warn!(error = %err, "Upstream failed, serving stale entry");
                        self.metrics.record_stale_fallback(&api);
                        let stale = !self.policy.is_fresh(key.resource_path(), entry.fetched_at, now);
                        Ok(Resolution::cached(entry, stale, Some(err.to_string())))
                    },
                    None => Err(err),
                }
            },
        }
    }

    async fn resolve_disabled(&self, key: &CacheKey, api: &str, force_refresh: bool) -> Result<Resolution> {
        let instance = key.instance();
        if self.disabled_policy == DisabledPolicy::Reject || force_refresh {
            return Err(VosError::InstanceDisabled(instance));
        }

        match self.lookup(key).await {
            Some(entry) => {
                let fresh = self
                    .policy
                    .is_fresh(key.resource_path(), entry.fetched_at, self.clock.now());
                if fresh {
                    self.metrics.record_hit(api);
                } else {
                    self.metrics.record_stale_fallback(api);
                }
                Ok(Resolution::cached(entry, !fresh, None))
            },
            None => Err(VosError::InstanceDisabled(instance)),
        }
    }

    /// A failing store read counts as a miss.
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            },
        }
    }
}
