//! Reads of the durable synced dataset.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use vos_core::{DataSource, GatewayKind, InstanceId};
use vos_sync::{CdrQuery, CdrRecord, CustomerRecord, GatewayRecord};

use crate::error::AppError;
use crate::state::AppState;

/// Upper bound of `limit` on call-record reads.
const MAX_CDR_LIMIT: usize = 5_000;

#[derive(Debug, Serialize)]
pub struct DatasetResponse<T> {
    pub success: bool,
    pub data_source: DataSource,
    pub instance_name: String,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> DatasetResponse<T> {
    fn new(instance_name: String, data: Vec<T>) -> Self {
        Self {
            success: true,
            data_source: DataSource::Dataset,
            instance_name,
            count: data.len(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CdrParams {
    pub account: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayParams {
    /// `mapping` o `routing`; sin valor, ambos.
    pub kind: Option<GatewayKind>,
}

/// GET /api/instances/{id}/customers
#[instrument(skip_all, fields(instance = %id))]
pub async fn customers(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<DatasetResponse<CustomerRecord>>, AppError> {
    let instance = state.registry().require(id)?;
    let records = state.dataset().customers(id)?;
    Ok(Json(DatasetResponse::new(instance.name, records)))
}

/// GET /api/instances/{id}/cdrs?account=&limit=
#[instrument(skip_all, fields(instance = %id))]
pub async fn cdrs(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Query(params): Query<CdrParams>,
) -> Result<Json<DatasetResponse<CdrRecord>>, AppError> {
    let instance = state.registry().require(id)?;
    let mut query = CdrQuery {
        account: params.account.filter(|a| !a.trim().is_empty()),
        ..CdrQuery::default()
    };
    if let Some(limit) = params.limit {
        query.limit = limit.clamp(1, MAX_CDR_LIMIT);
    }
    let records = state.dataset().cdrs(id, &query)?;
    Ok(Json(DatasetResponse::new(instance.name, records)))
}

/// GET /api/instances/{id}/gateways?kind=
#[instrument(skip_all, fields(instance = %id))]
pub async fn gateways(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Query(params): Query<GatewayParams>,
) -> Result<Json<DatasetResponse<GatewayRecord>>, AppError> {
    let instance = state.registry().require(id)?;
    let kind = params.kind.filter(|k| *k != GatewayKind::Both);
    let records = state.dataset().gateways(id, kind)?;
    Ok(Json(DatasetResponse::new(instance.name, records)))
}
