//! Metricas por request HTTP.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};

const REQUESTS_TOTAL: &str = "vos_http_requests_total";
const REQUEST_DURATION: &str = "vos_http_request_duration_seconds";

/// `2xx`, `4xx`... para poder agregar sin conocer cada codigo.
fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Cuenta y mide cada request.
///
/// El label `route` es el patron del router (`/api/instances/{id}/query`),
/// asi las series no crecen con el numero de instancias.
pub async fn http_metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = matched_path.map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());
    let method = request.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    let status = response.status();
    counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.as_u16().to_string(),
        "class" => status_class(status)
    )
    .increment(1);
    histogram!(REQUEST_DURATION, "method" => method, "route" => route).record(elapsed);

    response
}

pub fn register_http_metrics() {
    describe_counter!(REQUESTS_TOTAL, "HTTP requests by route and status");
    describe_histogram!(REQUEST_DURATION, "HTTP request latency in seconds");
}
