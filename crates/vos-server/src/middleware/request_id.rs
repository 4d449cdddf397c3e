//! Middleware que genera o propaga X-Request-Id.

use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
};
use tower::{Layer, Service};
use uuid::Uuid;

use super::BoxFuture;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Garantiza que cada request lleve un id, y lo devuelve en la respuesta.
///
/// Se respeta el id del cliente; si no viene (o no es ASCII visible) se
/// genera un UUID v7, que ordena por llegada en los logs.
#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

fn resolve_id(request: &Request<Body>) -> HeaderValue {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.to_str().is_ok())
        .cloned()
        .unwrap_or_else(generate_id)
}

fn generate_id() -> HeaderValue {
    let mut buf = Uuid::encode_buffer();
    let id = Uuid::now_v7().hyphenated().encode_lower(&mut buf);
    // Un UUID con guiones siempre es un header valido
    HeaderValue::from_str(id).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

impl<S> Service<Request<Body>> for RequestIdMiddleware<S>
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

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let id = resolve_id(&request);
        request.headers_mut().insert(REQUEST_ID_HEADER.clone(), id.clone());

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(request).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER.clone(), id);
            Ok(response)
        })
    }
}

// Tests de integracion en tests/middleware_test.rs
