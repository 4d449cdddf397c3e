//! VOS Core - Domain types for the VOS cache and sync layer
//!
//! This crate provides the foundational types shared by the upstream client,
//! the sync engine and the HTTP server: instances and their registry, the
//! TTL policy table, cache keys, job types and the error taxonomy.

pub mod clock;
pub mod error;
pub mod instance;
pub mod key;
pub mod paths;
pub mod sync;
pub mod ttl;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, VosError};
pub use instance::{InstanceId, InstanceRegistry, VosInstance};
pub use key::{CacheKey, normalize_params};
pub use sync::{
    DayWindow, GatewayKind, JobOptions, JobStatus, JobType, ProgressSnapshot, SyncJob,
    TriggerOrigin, TriggerReceipt,
};
pub use ttl::{Freshness, TtlPolicy, TtlTier};
pub use types::DataSource;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
