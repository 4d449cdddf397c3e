//! Instance listing and health endpoint handlers.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use tracing::instrument;
use vos_core::{InstanceId, VosInstance};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InstancesResponse {
    pub success: bool,
    pub instances: Vec<VosInstance>,
}

#[derive(Debug, Serialize)]
pub struct InstanceHealthResponse {
    pub instance_id: InstanceId,
    pub instance_name: String,
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/instances
pub async fn list_instances(State(state): State<AppState>) -> Json<InstancesResponse> {
    Json(InstancesResponse {
        success: true,
        instances: state.registry().all(),
    })
}

/// GET /api/instances/{id}
pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<VosInstance>, AppError> {
    Ok(Json(state.registry().require(id)?))
}

/// GET /api/instances/{id}/health
/// Llamada barata al upstream (GetSoftSwitch), sin pasar por la cache.
#[instrument(skip_all, fields(instance = %id))]
pub async fn instance_health(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<InstanceHealthResponse>, AppError> {
    let instance = state.registry().require_enabled(id)?;
    let upstream = state.resolver().upstream(&instance)?;

    let start = Instant::now();
    let outcome = upstream.health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    if let Err(e) = &outcome {
        tracing::warn!(error = %e, "Instance health check failed");
    }

    Ok(Json(InstanceHealthResponse {
        instance_id: id,
        instance_name: instance.name,
        reachable: outcome.is_ok(),
        latency_ms,
        error: outcome.err().map(|e| e.to_string()),
    }))
}
