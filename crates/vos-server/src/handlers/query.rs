//! Read query endpoint handlers.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use vos_core::{DataSource, InstanceId};

use crate::error::AppError;
use crate::fanout::InstanceOutcome;
use crate::state::AppState;

/// Request body of both query endpoints.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub resource_path: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub force_refresh: bool,
}

impl QueryRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.resource_path.trim().is_empty() {
            return Err(AppError::BadRequest("resource_path is required".to_string()));
        }
        if !(self.params.is_null() || self.params.is_object()) {
            return Err(AppError::BadRequest("params must be a JSON object".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Value,
    pub data_source: DataSource,
    pub synced_at: Option<DateTime<Utc>>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub instance_name: String,
}

#[derive(Debug, Serialize)]
pub struct FanoutResponse {
    pub success: bool,
    pub results: Vec<Value>,
    pub per_instance: Vec<InstanceOutcome>,
}

/// POST /api/instances/{id}/query
#[instrument(skip_all, fields(instance = %id, resource_path = %body.resource_path))]
pub async fn query_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Json(body): Json<QueryRequest>,
) -> Result<Response, AppError> {
    body.validate()?;
    let instance = state.registry().require(id)?;

    let resolution = state
        .resolver()
        .resolve(id, &body.resource_path, &body.params, body.force_refresh)
        .await?;

    tracing::info!(
        data_source = %resolution.source,
        stale = resolution.stale,
        "Query resolved"
    );

    Ok(Json(QueryResponse {
        success: true,
        data: resolution.payload.as_ref().clone(),
        data_source: resolution.source,
        synced_at: Some(resolution.fetched_at),
        stale: resolution.stale,
        error: resolution.warning,
        instance_name: instance.name,
    })
    .into_response())
}

/// POST /api/query
/// Consulta todas las instancias habilitadas. Nunca falla por una instancia.
#[instrument(skip_all, fields(resource_path = %body.resource_path))]
pub async fn query_all(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Response, AppError> {
    body.validate()?;

    let result = state
        .fanout()
        .query_all(&body.resource_path, &body.params, body.force_refresh)
        .await;

    let success = result.per_instance.is_empty() || result.succeeded() > 0;
    Ok(Json(FanoutResponse {
        success,
        results: result.results,
        per_instance: result.per_instance,
    })
    .into_response())
}
