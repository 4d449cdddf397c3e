//! Cache statistics and invalidation endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use vos_core::InstanceId;

use crate::cache::{KeyPattern, collect_stats};
use crate::error::AppError;
use crate::state::AppState;

/// Response para operaciones de invalidación.
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    /// Número de entries invalidadas.
    pub invalidated: usize,
    /// Mensaje descriptivo.
    pub message: String,
}

/// Query de DELETE /api/instances/{id}/cache
#[derive(Debug, Deserialize)]
pub struct InvalidateQuery {
    /// Si se indica, solo se invalida ese resource path.
    pub resource_path: Option<String>,
}

/// GET /api/instances/{id}/cache/stats
#[instrument(skip_all, fields(instance = %id))]
pub async fn instance_stats(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Response, AppError> {
    state.registry().require(id)?;
    let now = state.clock().now();
    let stats = collect_stats(state.store().as_ref(), Some(id), state.policy(), now).await?;
    Ok(Json(stats).into_response())
}

/// GET /api/cache/stats
#[instrument(skip_all)]
pub async fn global_stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let now = state.clock().now();
    let stats = collect_stats(state.store().as_ref(), None, state.policy(), now).await?;
    Ok(Json(stats).into_response())
}

/// DELETE /api/instances/{id}/cache[?resource_path=...]
/// Invalida todas las entries de una instancia, o las de un resource path.
#[instrument(skip_all, fields(instance = %id))]
pub async fn invalidate_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Response, AppError> {
    state.registry().require(id)?;

    let (pattern, scope) = match query.resource_path.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => (KeyPattern::resource(id, path), format!("'{}'", path)),
        _ => (KeyPattern::instance(id), "all resources".to_string()),
    };
    let result = state.store().invalidate(&pattern).await?;

    tracing::info!(
        pattern = %pattern,
        count = result.count,
        "Cache entries invalidated"
    );

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            success: true,
            invalidated: result.count,
            message: format!(
                "Invalidated {} cache entries of instance {} for {}",
                result.count, id, scope
            ),
        }),
    )
        .into_response())
}

/// DELETE /api/cache
/// Invalida toda la cache.
#[instrument(skip_all)]
pub async fn invalidate_all(State(state): State<AppState>) -> Result<Response, AppError> {
    let result = state.store().invalidate(&KeyPattern::all()).await?;

    tracing::info!(count = result.count, "All cache entries invalidated");

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            success: true,
            invalidated: result.count,
            message: format!("Invalidated all {} cache entries", result.count),
        }),
    )
        .into_response())
}
