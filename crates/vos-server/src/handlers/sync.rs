//! Sync trigger and progress endpoint handlers.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use vos_core::{InstanceId, JobOptions, JobType, ProgressSnapshot, SyncJob, TriggerOrigin, TriggerReceipt};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    /// `null` or absent: every enabled instance.
    #[serde(default)]
    pub instance_id: Option<InstanceId>,
    pub job_type: JobType,
    #[serde(default)]
    pub options: JobOptions,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub jobs: Vec<TriggerReceipt>,
}

/// Progreso de sync. Las cifras de cabecera son del primer job en curso
/// (orden por instancia y tipo); `jobs` trae todos.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub is_syncing: bool,
    pub current_instance: Option<String>,
    pub current_customer: Option<String>,
    pub synced_count: u64,
    pub progress_percent: Option<f64>,
    pub jobs: Vec<ProgressSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<ProgressSnapshot>,
}

/// POST /api/sync/trigger
///
/// For one instance a rejection (already running, disabled) is an error
/// response; for all instances each outcome is reported in `jobs`.
#[instrument(skip_all, fields(job_type = %body.job_type))]
pub async fn trigger_sync(
    State(state): State<AppState>,
    Json(body): Json<TriggerRequest>,
) -> Result<Response, AppError> {
    let engine = state.engine();

    let response = match body.instance_id {
        Some(id) => {
            let receipt = engine.trigger(id, body.job_type, body.options, TriggerOrigin::Manual)?;
            TriggerResponse {
                success: true,
                message: format!("{} sync started for instance {}", body.job_type, id),
                job_id: receipt.job_id,
                jobs: vec![receipt],
            }
        },
        None => {
            let receipts = engine.trigger_all(body.job_type, body.options, TriggerOrigin::Manual);
            let accepted = receipts.iter().filter(|r| r.accepted).count();
            TriggerResponse {
                success: accepted > 0,
                message: format!(
                    "{} sync started for {} of {} instances",
                    body.job_type,
                    accepted,
                    receipts.len()
                ),
                job_id: None,
                jobs: receipts,
            }
        },
    };

    tracing::info!(message = %response.message, "Sync trigger handled");
    Ok(Json(response).into_response())
}

/// GET /api/sync/progress
#[instrument(skip_all)]
pub async fn sync_progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    let running = state.engine().progress();
    // Los campos de cabecera describen un solo job; el resto va en `jobs`
    let current = running.first();

    Json(ProgressResponse {
        is_syncing: !running.is_empty(),
        current_instance: current.map(|s| s.instance_name.clone()),
        current_customer: current.and_then(|s| s.current_sub_target.clone()),
        synced_count: current.map_or(0, |s| s.synced_count),
        progress_percent: current.and_then(|s| s.percent_complete),
        jobs: running,
    })
}

/// GET /api/sync/jobs
/// Una fila por (instancia, tipo de job), incluidas las que nunca corrieron.
#[instrument(skip_all)]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Response, AppError> {
    let jobs = state.engine().statuses()?;
    Ok(Json(JobsResponse { jobs }).into_response())
}

/// GET /api/sync/jobs/{job_id}
#[instrument(skip_all, fields(job_id = %job_id))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SyncJob>, AppError> {
    state
        .engine()
        .job(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("sync job {} not found", job_id)))
}
