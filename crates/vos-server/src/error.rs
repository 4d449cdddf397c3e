use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use vos_core::VosError;

use crate::cache::CacheError;

#[derive(Debug)]
pub enum AppError {
    /// Instancia o job no encontrado
    NotFound(String),

    /// Parametros invalidos
    BadRequest(String),

    /// Instancia deshabilitada
    Forbidden(String),

    /// Sync ya en curso para el par (instancia, tipo). No es un fallo.
    Conflict(String),

    /// El upstream respondio con un retCode distinto de cero
    BadGateway(String),

    /// El upstream no responde y no hay entry en cache
    ServiceUnavailable(String),

    /// Error interno
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    rejected: bool,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let rejected = matches!(self, AppError::Conflict(_));
        let (error, message) = match self {
            AppError::NotFound(msg) => ("Not Found", msg),
            AppError::BadRequest(msg) => ("Bad Request", msg),
            AppError::Forbidden(msg) => ("Forbidden", msg),
            AppError::Conflict(msg) => ("Conflict", msg),
            AppError::BadGateway(msg) => ("Bad Gateway", msg),
            AppError::ServiceUnavailable(msg) => ("Service Unavailable", msg),
            AppError::Internal(msg) => {
                error!(message = %msg, "Internal error");
                ("Internal Server Error", msg)
            },
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            message,
            rejected,
        });

        (status, body).into_response()
    }
}

impl From<VosError> for AppError {
    fn from(err: VosError) -> Self {
        let message = err.to_string();
        match err {
            VosError::InstanceNotFound(_) => AppError::NotFound(message),
            VosError::InstanceDisabled(_) => AppError::Forbidden(message),
            VosError::SyncAlreadyRunning { .. } => AppError::Conflict(message),
            VosError::UpstreamRejected { .. } => AppError::BadGateway(message),
            VosError::UpstreamUnavailable { .. } => AppError::ServiceUnavailable(message),
            VosError::InvalidRequest(_) => AppError::BadRequest(message),
            VosError::SyncPartialFailure { .. } | VosError::Storage(_) => AppError::Internal(message),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Internal(err.to_string())
    }
}
