//! # VOS Sync
//!
//! Bulk synchronization of VOS instances into a durable dataset.
//!
//! ## Features
//!
//! - [`SyncEngine`]: single-flight jobs per (instance, job type) on background tasks
//! - Live progress snapshots while a job runs
//! - Per-batch commits, so a failed job keeps what it already wrote
//! - Cache invalidation hook run after each completed job
//! - [`SyncScheduler`]: cron schedules over every enabled instance
//! - [`SqliteDataset`]: customers, call records, gateways and job status rows
//!
//! ## Example
//!
//! ```ignore
//! use vos_sync::{SqliteDataset, SyncEngine};
//!
//! let dataset = Arc::new(SqliteDataset::open("data/dataset.db")?);
//! let engine = SyncEngine::builder(registry, connector, dataset).build();
//!
//! let receipt = engine.trigger(id, JobType::Cdrs, JobOptions::default(), TriggerOrigin::Manual)?;
//! let job = engine.wait(receipt.job_id.unwrap()).await;
//! ```

pub mod dataset;
pub mod engine;
pub mod invalidation;
mod jobs;
pub mod metrics;
pub mod progress;
pub mod scheduler;

// Re-exports
pub use dataset::{
    CdrQuery, CdrRecord, CustomerRecord, Dataset, GatewayRecord, SqliteDataset, cdr_hash,
};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use invalidation::{CacheInvalidation, NoopInvalidation};
pub use metrics::register_sync_metrics;
pub use progress::ProgressReporter;
pub use scheduler::{
    ScheduleEntry, SchedulerConfig, SchedulerHandle, SyncScheduler, default_schedules, parse_cron,
};
