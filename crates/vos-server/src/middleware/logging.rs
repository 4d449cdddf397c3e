//! Middleware de logging estructurado.
//!
//! Cada request corre dentro de un span `http_request` con el request id y,
//! cuando la ruta apunta a una instancia, su id en el campo `instance`.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
};
use tower::{Layer, Service};
use tracing::{Instrument, Span, field, info, info_span, warn};

use super::BoxFuture;
use super::request_id::REQUEST_ID_HEADER;

#[derive(Clone, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

/// Id de instancia de rutas `/api/instances/{id}/...`.
fn instance_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/api/instances/")?;
    let id = rest.split('/').next()?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

fn request_span(request: &Request<Body>) -> Span {
    // RequestIdMiddleware corre antes y siempre deja el header
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let path = request.uri().path();

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %path,
        instance = field::Empty,
    );
    if let Some(instance) = instance_from_path(path) {
        span.record("instance", instance);
    }
    span
}

impl<S> Service<Request<Body>> for LoggingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let start = Instant::now();
        let span = request_span(&request);
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let response = inner.call(request).await?;

                let status = response.status().as_u16();
                let duration_ms = start.elapsed().as_millis() as u64;
                if response.status().is_server_error() {
                    warn!(status, duration_ms, "Request failed");
                } else {
                    info!(status, duration_ms, "Request completed");
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}
