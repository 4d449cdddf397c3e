//! Upstream request type.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vos_core::{normalize_params, paths};

/// A call to one VOS management API.
///
/// The path and parameters are normalized on construction, so the upstream
/// receives exactly the parameter set that keys the cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamRequest {
    /// The resource path (e.g., "/external/server/GetCdr").
    path: String,

    /// The normalized JSON body.
    params: Value,
}

impl UpstreamRequest {
    /// Creates a new request.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use vos_upstream::UpstreamRequest;
    ///
    /// let request = UpstreamRequest::new("GetGatewayMapping", json!({"names": []}));
    /// assert_eq!(request.path(), "/external/server/GetGatewayMapping");
    /// assert_eq!(request.params(), &json!({}));
    /// ```
    pub fn new(path: &str, params: Value) -> Self {
        Self {
            path: paths::normalize(path),
            params: normalize_params(&params),
        }
    }

    /// Returns the resource path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the normalized parameters.
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Returns the API name (last path segment).
    pub fn api_name(&self) -> &str {
        paths::api_name(&self.path)
    }
}

impl fmt::Display for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.params)
    }
}
