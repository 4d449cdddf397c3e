use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::handlers::{
    cache::{global_stats, instance_stats, invalidate_all, invalidate_instance},
    dataset::{cdrs, customers, gateways},
    health::health_check,
    instances::{get_instance, instance_health, list_instances},
    metrics::metrics_handler,
    query::{query_all, query_instance},
    sync::{get_job, list_jobs, sync_progress, trigger_sync},
};
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::state::AppState;

/// Creates a router with the given application state and metrics handle.
pub fn create_router_with_state(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    // Router for metrics endpoint (different state)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let api_router = Router::new()
        .route("/health", get(health_check))
        // Instances
        .route("/api/instances", get(list_instances))
        .route("/api/instances/{id}", get(get_instance))
        .route("/api/instances/{id}/health", get(instance_health))
        // Reads
        .route("/api/instances/{id}/query", post(query_instance))
        .route("/api/query", post(query_all))
        // Cache administration
        .route("/api/instances/{id}/cache/stats", get(instance_stats))
        .route("/api/instances/{id}/cache", delete(invalidate_instance))
        .route("/api/cache/stats", get(global_stats))
        .route("/api/cache", delete(invalidate_all))
        // Sync
        .route("/api/sync/trigger", post(trigger_sync))
        .route("/api/sync/progress", get(sync_progress))
        .route("/api/sync/jobs", get(list_jobs))
        .route("/api/sync/jobs/{job_id}", get(get_job))
        // Synced dataset
        .route("/api/instances/{id}/customers", get(customers))
        .route("/api/instances/{id}/cdrs", get(cdrs))
        .route("/api/instances/{id}/gateways", get(gateways))
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(metrics_router)
        .layer(middleware::from_fn(
            crate::metrics::http::http_metrics_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(middleware_stack)
}

/// Creates a router without state (health endpoint only).
pub fn create_router() -> Router {
    let middleware = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    Router::new()
        .route("/health", get(health_check))
        .layer(middleware)
}

/// Runs the server until Ctrl+C or SIGTERM.
pub async fn run_server_with_state(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = create_router_with_state(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
