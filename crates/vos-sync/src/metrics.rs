//! Sync job metrics recording.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use vos_core::JobType;

/// Registra las metricas de sincronizacion.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_sync_metrics() {
    metrics::describe_counter!(
        "vos_sync_jobs_total",
        "Total number of sync jobs by job type and outcome"
    );
    metrics::describe_counter!(
        "vos_sync_rejections_total",
        "Sync triggers rejected because a job was already running"
    );
    metrics::describe_counter!(
        "vos_sync_records_total",
        "Records durably written by sync jobs"
    );
    metrics::describe_gauge!("vos_sync_running_jobs", "Sync jobs currently running");
    metrics::describe_histogram!(
        "vos_sync_job_duration_seconds",
        "Wall-clock duration of finished sync jobs"
    );
}

pub(crate) fn record_started(job_type: JobType, running: usize) {
    counter!("vos_sync_jobs_total", "job_type" => job_type.as_str(), "outcome" => "started")
        .increment(1);
    gauge!("vos_sync_running_jobs").set(running as f64);
}

pub(crate) fn record_rejected(job_type: JobType) {
    counter!("vos_sync_rejections_total", "job_type" => job_type.as_str()).increment(1);
}

pub(crate) fn record_records(job_type: JobType, count: u64) {
    counter!("vos_sync_records_total", "job_type" => job_type.as_str()).increment(count);
}

pub(crate) fn record_finished(job_type: JobType, outcome: &'static str, elapsed: Duration, running: usize) {
    counter!("vos_sync_jobs_total", "job_type" => job_type.as_str(), "outcome" => outcome)
        .increment(1);
    histogram!("vos_sync_job_duration_seconds", "job_type" => job_type.as_str())
        .record(elapsed.as_secs_f64());
    gauge!("vos_sync_running_jobs").set(running as f64);
}
