//! HTTP client for the VOS management API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use vos_core::VosInstance;

use crate::error::UpstreamError;
use crate::source::{Upstream, UpstreamConnector, UpstreamRequest};

/// Default timeout of a single upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `retCode` reported for responses that carry none.
pub const MISSING_RET_CODE: i64 = -999;

/// Interprets a decoded VOS response.
///
/// Only `retCode == 0` is success. Anything else, including a missing code,
/// is a rejection whose message comes from `exception`.
pub fn interpret_response(payload: Value) -> Result<Value, UpstreamError> {
    let code = match payload.get("retCode") {
        None | Some(Value::Null) => MISSING_RET_CODE,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(-1),
        Some(_) => -1,
    };

    if code == 0 {
        return Ok(payload);
    }

    let message = payload
        .get("exception")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("retCode {}", code));

    Err(UpstreamError::rejected(code, message))
}

/// Client for one VOS instance.
#[derive(Debug, Clone)]
pub struct VosClient {
    http: reqwest::Client,
    base_url: String,
    name: String,
    timeout: Duration,
}

impl VosClient {
    /// Creates a client for the instance sharing the given HTTP pool.
    pub fn new(http: reqwest::Client, instance: &VosInstance, timeout: Duration) -> Self {
        Self {
            http,
            base_url: instance.base_url.trim_end_matches('/').to_string(),
            name: instance.name.clone(),
            timeout,
        }
    }

    /// Full URL of a request.
    pub fn url_for(&self, request: &UpstreamRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl Upstream for VosClient {
    #[instrument(skip_all, fields(upstream = %self.name, api = %request.api_name()))]
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        let url = self.url_for(request);
        let body = serde_json::to_vec(request.params())
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        debug!(url = %url, "Calling upstream");

        let response = self
            .http
            .post(&url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html;charset=UTF-8"),
            )
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    UpstreamError::unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "Upstream answered with HTTP error");
            return Err(UpstreamError::unavailable(format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                UpstreamError::unavailable(e.to_string())
            }
        })?;

        let payload: Value =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        interpret_response(payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Connector that builds [`VosClient`]s over a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpConnector {
    /// Creates a connector with the given per-call timeout.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vos-cache/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| UpstreamError::unavailable(e.to_string()))?;
        Ok(Self { http, timeout })
    }
}

impl UpstreamConnector for HttpConnector {
    fn connect(&self, instance: &VosInstance) -> Result<Arc<dyn Upstream>, UpstreamError> {
        let base = instance.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(UpstreamError::unavailable(format!(
                "invalid base_url '{}' for instance {}",
                instance.base_url, instance.id
            )));
        }
        Ok(Arc::new(VosClient::new(self.http.clone(), instance, self.timeout)))
    }
}
