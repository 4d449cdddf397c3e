//! VOS cache server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vos_core::{Clock, SystemClock};
use vos_server::cache::{
    CacheStore, MemoryCacheConfig, MemoryStore, SqliteStore, spawn_purge_task,
};
use vos_server::config::IN_MEMORY;
use vos_server::metrics::{CacheMetrics, init_metrics};
use vos_server::{AppState, CacheBackend, ServerConfig, StateOptions, run_server_with_state};
use vos_sync::{SqliteDataset, SyncScheduler};
use vos_upstream::HttpConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load().context("failed to load configuration")?;
    let addr = config.socket_addr()?;

    tracing::info!("Starting VOS cache server v{}", vos_server::version());
    tracing::info!(
        instances = config.instances.len(),
        cache_backend = ?config.storage.cache_backend,
        dataset = %config.storage.dataset_path,
        "Configuration loaded"
    );

    let prometheus = init_metrics().context("failed to install metrics recorder")?;
    let metrics = CacheMetrics::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let dataset = if config.storage.dataset_path == IN_MEMORY {
        SqliteDataset::open_in_memory()
    } else {
        SqliteDataset::open(&config.storage.dataset_path)
    }
    .context("failed to open dataset")?;
    let interrupted = dataset.fail_interrupted_jobs(clock.now())?;
    if interrupted > 0 {
        tracing::warn!(count = interrupted, "Marked interrupted sync jobs as failed");
    }

    let store: Arc<dyn CacheStore> = match config.storage.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new(
            MemoryCacheConfig {
                max_capacity: config.storage.cache_capacity,
                ..MemoryCacheConfig::default()
            },
            metrics.clone(),
        )),
        CacheBackend::Sqlite if config.storage.cache_path == IN_MEMORY => {
            Arc::new(SqliteStore::open_in_memory()?)
        },
        CacheBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.storage.cache_path).context("failed to open cache database")?,
        ),
    };

    let connector = Arc::new(HttpConnector::new(config.upstream_timeout())?);
    let registry = Arc::new(config.registry()?);

    let state = AppState::new(
        registry,
        connector,
        Arc::clone(&store),
        Arc::new(dataset),
        StateOptions {
            policy: config.ttl_policy(),
            disabled_policy: config.resolver.disabled_policy,
            fanout_concurrency: config.fanout.max_concurrency,
            clock: Arc::clone(&clock),
            metrics,
        },
    );

    // Keep the handle alive for the lifetime of the server
    let _scheduler = if config.scheduler.enabled {
        let scheduler = SyncScheduler::new(
            state.engine().clone(),
            config.schedules.clone(),
            config.scheduler_config(),
        )?;
        for (job_type, next) in scheduler.next_runs() {
            tracing::info!(job_type = %job_type, next_run = ?next, "Sync scheduled");
        }
        Some(scheduler.start())
    } else {
        tracing::info!("Sync scheduler disabled");
        None
    };

    let purge = spawn_purge_task(
        store,
        Arc::new(config.ttl_policy()),
        clock,
        config.purge_interval(),
    );

    run_server_with_state(addr, state, prometheus).await?;

    purge.abort();
    Ok(())
}
