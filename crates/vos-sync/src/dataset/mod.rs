//! Durable synced dataset.
//!
//! Bulk sync jobs write customer rosters, call records and gateway tables
//! here; the server reads them back for dataset queries. Every write is
//! committed per batch, so a job that fails halfway leaves its earlier
//! batches visible.

mod records;
mod sqlite;

pub use records::{CdrRecord, CustomerRecord, GatewayRecord, cdr_hash};
pub use sqlite::SqliteDataset;

use vos_core::{GatewayKind, InstanceId, Result, SyncJob};

/// Filter for call-record reads.
#[derive(Debug, Clone)]
pub struct CdrQuery {
    pub account: Option<String>,
    pub limit: usize,
}

impl Default for CdrQuery {
    fn default() -> Self {
        Self {
            account: None,
            limit: 500,
        }
    }
}

/// Storage of synced records and job status rows.
pub trait Dataset: Send + Sync {
    /// Inserts or replaces customers by (instance, account). Returns the
    /// number of rows written.
    fn upsert_customers(&self, instance: InstanceId, records: &[CustomerRecord]) -> Result<usize>;

    /// Customers of an instance, ordered by account.
    fn customers(&self, instance: InstanceId) -> Result<Vec<CustomerRecord>>;

    /// Inserts call records, skipping hashes already present. Returns the
    /// number of new rows.
    fn insert_cdrs(&self, instance: InstanceId, records: &[CdrRecord]) -> Result<usize>;

    /// Call records of an instance, newest start time first.
    fn cdrs(&self, instance: InstanceId, query: &CdrQuery) -> Result<Vec<CdrRecord>>;

    fn cdr_count(&self, instance: InstanceId) -> Result<u64>;

    /// Inserts or replaces gateways by (instance, kind, name).
    fn upsert_gateways(&self, instance: InstanceId, records: &[GatewayRecord]) -> Result<usize>;

    /// Gateways of an instance, optionally restricted to one kind.
    fn gateways(&self, instance: InstanceId, kind: Option<GatewayKind>) -> Result<Vec<GatewayRecord>>;

    /// Stores the current status row of the job's (instance, job type) pair.
    fn save_job(&self, job: &SyncJob) -> Result<()>;

    /// All stored status rows.
    fn job_statuses(&self) -> Result<Vec<SyncJob>>;
}
