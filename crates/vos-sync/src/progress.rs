//! In-place progress tracking for a running job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use vos_core::{JobStatus, ProgressSnapshot, SyncJob, VosError};

/// Shared handle to the job record a runner mutates while it works.
///
/// Readers take snapshots; the runner is the only writer.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job: Arc<RwLock<SyncJob>>,
}

impl ProgressReporter {
    pub(crate) fn new(job: Arc<RwLock<SyncJob>>) -> Self {
        Self { job }
    }

    /// Sets the number of sub-targets.
    pub fn set_total(&self, total: usize) {
        self.job.write().total = Some(total as u64);
    }

    /// Names the sub-target being worked on.
    pub fn begin(&self, sub_target: impl Into<String>) {
        self.job.write().current_sub_target = Some(sub_target.into());
    }

    /// Adds durably written records.
    pub fn record(&self, written: usize) {
        let job_type = {
            let mut job = self.job.write();
            job.synced_count += written as u64;
            job.job_type
        };
        crate::metrics::record_records(job_type, written as u64);
    }

    /// Marks `count` sub-targets as processed.
    pub fn advance(&self, count: usize) {
        self.job.write().processed += count as u64;
    }

    pub fn synced_count(&self) -> u64 {
        self.job.read().synced_count
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.job.read().snapshot()
    }

    /// Moves the job to `completed` and returns its final state.
    pub(crate) fn complete(&self, now: DateTime<Utc>) -> SyncJob {
        let mut job = self.job.write();
        job.status = JobStatus::Completed;
        job.finished_at = Some(now);
        job.current_sub_target = None;
        job.clone()
    }

    /// Moves the job to `failed`, keeping everything committed so far.
    pub(crate) fn fail(&self, now: DateTime<Utc>, error: &VosError) -> SyncJob {
        let mut job = self.job.write();
        job.status = JobStatus::Failed;
        job.finished_at = Some(now);
        job.error = Some(error.to_string());
        job.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vos_core::{InstanceId, JobOptions, JobType};

    fn reporter() -> ProgressReporter {
        let job = SyncJob::start(InstanceId::new(1), "main", JobType::Cdrs, JobOptions::default(), Utc::now());
        ProgressReporter::new(Arc::new(RwLock::new(job)))
    }

    #[test]
    fn test_progress_updates_in_place() {
        let progress = reporter();
        progress.set_total(4);
        progress.begin("customer 1/4 (1001)");
        progress.record(10);
        progress.advance(1);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.synced_count, 10);
        assert_eq!(snapshot.percent_complete, Some(25.0));
        assert_eq!(snapshot.current_sub_target.as_deref(), Some("customer 1/4 (1001)"));
        assert_eq!(snapshot.status, JobStatus::Running);
    }

    #[test]
    fn test_fail_keeps_synced_count() {
        let progress = reporter();
        progress.record(7);
        let job = progress.fail(Utc::now(), &VosError::unavailable(InstanceId::new(1), "timeout"));

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.synced_count, 7);
        assert!(job.error.unwrap().contains("timeout"));
    }

    #[test]
    fn test_complete_clears_sub_target() {
        let progress = reporter();
        progress.begin("x");
        let job = progress.complete(Utc::now());
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.current_sub_target.is_none());
        assert!(job.finished_at.is_some());
    }
}
