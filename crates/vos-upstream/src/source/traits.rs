//! Upstream trait definitions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use vos_core::{VosInstance, paths};

use super::UpstreamRequest;
use crate::error::UpstreamError;

/// A VOS management API endpoint.
///
/// Abstracts over the transport so the resolver and the sync jobs can be
/// driven by the HTTP client in production and by in-process fixtures in
/// tests.
///
/// # Example
///
/// ```ignore
/// use vos_upstream::{Upstream, UpstreamRequest, UpstreamError};
///
/// struct Canned;
///
/// #[async_trait]
/// impl Upstream for Canned {
///     async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
///         Ok(json!({"retCode": 0}))
///     }
///
///     fn name(&self) -> &str {
///         "canned"
///     }
/// }
/// ```
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Performs one call.
    ///
    /// # Arguments
    ///
    /// * `request` - Normalized path and parameters
    ///
    /// # Returns
    ///
    /// The full JSON payload of a successful (`retCode == 0`) response.
    ///
    /// # Errors
    ///
    /// - `UpstreamError::Unavailable` / `Timeout` if the instance is unreachable
    /// - `UpstreamError::Rejected` if the instance answered with a non-zero `retCode`
    /// - `UpstreamError::Decode` if the body is not JSON
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError>;

    /// Returns the name of this upstream, used for logging.
    fn name(&self) -> &str;

    /// Performs a cheap call to verify the instance answers.
    ///
    /// The default implementation reads the soft-switch settings.
    async fn health_check(&self) -> Result<(), UpstreamError> {
        let request = UpstreamRequest::new(paths::GET_SOFT_SWITCH, json!({}));
        self.call(&request).await.map(|_| ())
    }
}

/// Produces an [`Upstream`] for a configured instance.
pub trait UpstreamConnector: Send + Sync {
    /// Returns a client for the instance.
    ///
    /// # Errors
    ///
    /// `UpstreamError::Unavailable` if no client can be built for the
    /// instance (e.g., a malformed base URL).
    fn connect(&self, instance: &VosInstance) -> Result<Arc<dyn Upstream>, UpstreamError>;
}
