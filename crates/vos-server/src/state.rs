//! Application state.

use std::sync::Arc;

use vos_core::{Clock, InstanceRegistry, SystemClock, TtlPolicy};
use vos_sync::{Dataset, SyncEngine};
use vos_upstream::UpstreamConnector;

use crate::cache::{CacheStore, StoreInvalidation};
use crate::fanout::{DEFAULT_MAX_CONCURRENCY, QueryFanout};
use crate::metrics::CacheMetrics;
use crate::resolver::{DisabledPolicy, FreshnessResolver};

/// Knobs for [`AppState::new`].
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub policy: TtlPolicy,
    pub disabled_policy: DisabledPolicy,
    pub fanout_concurrency: usize,
    pub clock: Arc<dyn Clock>,
    pub metrics: CacheMetrics,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            policy: TtlPolicy::standard(),
            disabled_policy: DisabledPolicy::default(),
            fanout_concurrency: DEFAULT_MAX_CONCURRENCY,
            clock: Arc::new(SystemClock),
            metrics: CacheMetrics::new(),
        }
    }
}

struct Inner {
    registry: Arc<InstanceRegistry>,
    store: Arc<dyn CacheStore>,
    resolver: Arc<FreshnessResolver>,
    fanout: QueryFanout,
    engine: SyncEngine,
    clock: Arc<dyn Clock>,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    /// Wires resolver, fan-out and sync engine over the given parts.
    ///
    /// Completed sync jobs invalidate their cache family in `store`.
    pub fn new(
        registry: Arc<InstanceRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        store: Arc<dyn CacheStore>,
        dataset: Arc<dyn Dataset>,
        options: StateOptions,
    ) -> Self {
        let policy = Arc::new(options.policy);
        let resolver = Arc::new(
            FreshnessResolver::new(
                Arc::clone(&registry),
                Arc::clone(&connector),
                Arc::clone(&store),
                policy,
                Arc::clone(&options.clock),
            )
            .with_metrics(options.metrics)
            .with_disabled_policy(options.disabled_policy),
        );
        let fanout = QueryFanout::new(Arc::clone(&resolver), Arc::clone(&registry))
            .with_max_concurrency(options.fanout_concurrency);
        let engine = SyncEngine::builder(Arc::clone(&registry), connector, dataset)
            .invalidation(Arc::new(StoreInvalidation::new(Arc::clone(&store))))
            .clock(Arc::clone(&options.clock))
            .build();

        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                resolver,
                fanout,
                engine,
                clock: options.clock,
            }),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.store
    }

    pub fn resolver(&self) -> &FreshnessResolver {
        &self.inner.resolver
    }

    pub fn fanout(&self) -> &QueryFanout {
        &self.inner.fanout
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.inner.engine
    }

    pub fn dataset(&self) -> &dyn Dataset {
        self.inner.engine.dataset().as_ref()
    }

    pub fn policy(&self) -> &TtlPolicy {
        self.inner.resolver.policy()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }
}
