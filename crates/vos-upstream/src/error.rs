//! Error types for upstream calls.

use vos_core::{InstanceId, VosError};

/// Errors that can occur when calling a VOS management API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The instance could not be reached or answered with something that is
    /// not a VOS response.
    #[error("upstream unavailable: {reason}")]
    Unavailable { reason: String },

    /// The instance answered with a non-zero `retCode`.
    #[error("upstream rejected request (retCode {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The request timed out.
    #[error("upstream call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The response body was not valid JSON.
    #[error("invalid upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Creates a new unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new rejected error.
    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Scopes the error to an instance.
    pub fn into_vos(self, instance: InstanceId) -> VosError {
        match self {
            Self::Rejected { code, message } => VosError::rejected(instance, code, message),
            other => VosError::unavailable(instance, other.to_string()),
        }
    }
}
