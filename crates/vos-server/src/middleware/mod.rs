//! Tower middleware aplicado a todas las rutas.
//!
//! - `RequestIdLayer`: genera (UUID v7) o propaga X-Request-Id
//! - `LoggingLayer`: span `http_request` con request id e instancia

use std::future::Future;
use std::pin::Pin;

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
