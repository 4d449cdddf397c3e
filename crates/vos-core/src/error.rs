//! Error types for the VOS cache and sync layer.
//!
//! Every fallible operation in the workspace eventually reports a
//! [`VosError`]. Library crates may carry narrower error enums of their own
//! (the upstream client has `UpstreamError`, the cache stores have
//! `CacheError`) and convert into this one at their boundary.
//!
//! # Example
//!
//! ```
//! use vos_core::{InstanceId, Result, VosError};
//!
//! fn ensure_enabled(id: InstanceId, enabled: bool) -> Result<()> {
//!     if !enabled {
//!         return Err(VosError::InstanceDisabled(id));
//!     }
//!     Ok(())
//! }
//!
//! let err = ensure_enabled(InstanceId::new(3), false).unwrap_err();
//! assert!(err.is_rejection());
//! ```

use thiserror::Error;

use crate::instance::InstanceId;
use crate::sync::JobType;

/// Main error type for VOS cache and sync operations.
#[derive(Debug, Error)]
pub enum VosError {
    /// The upstream instance could not be reached (network failure, timeout,
    /// undecodable response).
    #[error("upstream instance {instance} unavailable: {reason}")]
    UpstreamUnavailable {
        /// Instance that was called
        instance: InstanceId,
        /// What went wrong
        reason: String,
    },

    /// The upstream answered with a structured error (non-zero `retCode`).
    #[error("upstream instance {instance} rejected the request (retCode {code}): {message}")]
    UpstreamRejected {
        /// Instance that was called
        instance: InstanceId,
        /// The `retCode` reported by the upstream
        code: i64,
        /// The `exception` text reported by the upstream
        message: String,
    },

    /// No instance with that identity is configured.
    #[error("instance {0} not found")]
    InstanceNotFound(InstanceId),

    /// The instance exists but is disabled.
    #[error("instance {0} is disabled")]
    InstanceDisabled(InstanceId),

    /// A job for the same (instance, job type) pair is already running.
    #[error("{job_type} sync already running for instance {instance}")]
    SyncAlreadyRunning {
        /// Instance targeted by the trigger
        instance: InstanceId,
        /// Job type targeted by the trigger
        job_type: JobType,
    },

    /// A sync job failed after some records were already committed.
    #[error("{job_type} sync for instance {instance} failed after committing {committed} records: {reason}")]
    SyncPartialFailure {
        /// Instance the job ran for
        instance: InstanceId,
        /// Job type
        job_type: JobType,
        /// Records durably written before the failure
        committed: u64,
        /// The underlying failure
        reason: String,
    },

    /// The durable store (cache table or synced dataset) failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl VosError {
    /// Creates an `UpstreamUnavailable` error.
    pub fn unavailable(instance: InstanceId, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            instance,
            reason: reason.into(),
        }
    }

    /// Creates an `UpstreamRejected` error.
    pub fn rejected(instance: InstanceId, code: i64, message: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            instance,
            code,
            message: message.into(),
        }
    }

    /// Creates a `Storage` error from anything displayable.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Creates an `InvalidRequest` error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Returns true if the failure came from the upstream instance.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::UpstreamRejected { .. }
        )
    }

    /// Returns true if retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::SyncAlreadyRunning { .. }
        )
    }

    /// Returns true for "not found" conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound(_))
    }

    /// Returns true for refusals that are part of normal operation rather
    /// than failures: a job already running, a disabled instance.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SyncAlreadyRunning { .. } | Self::InstanceDisabled(_)
        )
    }

    /// Instance the error is scoped to, if any.
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::UpstreamUnavailable { instance, .. }
            | Self::UpstreamRejected { instance, .. }
            | Self::SyncAlreadyRunning { instance, .. }
            | Self::SyncPartialFailure { instance, .. } => Some(*instance),
            Self::InstanceNotFound(id) | Self::InstanceDisabled(id) => Some(*id),
            Self::Storage(_) | Self::InvalidRequest(_) => None,
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, VosError>;
