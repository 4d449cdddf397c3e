//! Cron-driven sync scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};
use vos_core::{JobOptions, JobType, Result, TriggerOrigin, TriggerReceipt, VosError};

use crate::engine::SyncEngine;

/// One scheduled job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub job_type: JobType,
    /// Five-field cron expression, evaluated in UTC.
    pub cron: String,
    #[serde(default)]
    pub options: JobOptions,
}

impl ScheduleEntry {
    pub fn new(job_type: JobType, cron: impl Into<String>) -> Self {
        Self {
            job_type,
            cron: cron.into(),
            options: JobOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}

/// Nightly defaults: roster first, then yesterday's call records, then gateways.
pub fn default_schedules() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry::new(JobType::Customers, "0 1 * * *"),
        ScheduleEntry::new(JobType::Cdrs, "30 1 * * *").with_options(JobOptions {
            days: Some(1),
            ..JobOptions::default()
        }),
        ScheduleEntry::new(JobType::Gateways, "0 2 * * *"),
    ]
}

/// Parses a cron expression, mapping failures to a request error.
pub fn parse_cron(expr: &str) -> Result<Cron> {
    Cron::new(expr)
        .parse()
        .map_err(|e| VosError::invalid(format!("invalid cron expression '{}': {}", expr, e)))
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the schedule is checked.
    pub check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Handle for a running scheduler. Dropping it stops the scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ScheduledJob {
    entry: ScheduleEntry,
    cron: Cron,
}

/// Fires scheduled jobs on every enabled instance.
pub struct SyncScheduler {
    engine: SyncEngine,
    jobs: Vec<ScheduledJob>,
    config: SchedulerConfig,
    /// Upper bound of the last checked window.
    last_checked: DateTime<Utc>,
}

impl SyncScheduler {
    /// Validates every expression up front; one bad entry fails the whole
    /// schedule.
    pub fn new(engine: SyncEngine, entries: Vec<ScheduleEntry>, config: SchedulerConfig) -> Result<Self> {
        let jobs = entries
            .into_iter()
            .map(|entry| {
                let cron = parse_cron(&entry.cron)?;
                Ok(ScheduledJob { entry, cron })
            })
            .collect::<Result<Vec<_>>>()?;
        let last_checked = engine.now();

        Ok(Self {
            engine,
            jobs,
            config,
            last_checked,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.jobs.iter().map(|job| &job.entry)
    }

    /// Next firing time of each entry after the last check.
    pub fn next_runs(&self) -> Vec<(JobType, Option<DateTime<Utc>>)> {
        self.jobs
            .iter()
            .map(|job| {
                let next = job.cron.find_next_occurrence(&self.last_checked, false).ok();
                (job.entry.job_type, next)
            })
            .collect()
    }

    /// Fires every entry with an occurrence in `(last_checked, now]`.
    ///
    /// Several missed occurrences of one entry collapse into a single run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TriggerReceipt> {
        let mut receipts = Vec::new();
        for job in &self.jobs {
            let due = match job.cron.find_next_occurrence(&self.last_checked, false) {
                Ok(next) => next <= now,
                Err(e) => {
                    warn!(cron = %job.entry.cron, error = %e, "No next occurrence");
                    false
                },
            };
            if !due {
                continue;
            }

            info!(job_type = %job.entry.job_type, cron = %job.entry.cron, "Scheduled sync due");
            let fired = self.engine.trigger_all(
                job.entry.job_type,
                job.entry.options.clone(),
                TriggerOrigin::Scheduled,
            );
            for receipt in fired.iter().filter(|r| !r.accepted) {
                debug!(
                    instance = %receipt.instance,
                    job_type = %receipt.job_type,
                    reason = receipt.reason.as_deref().unwrap_or(""),
                    "Scheduled sync skipped"
                );
            }
            receipts.extend(fired);
        }

        if now > self.last_checked {
            self.last_checked = now;
        }
        receipts
    }

    /// Starts the background loop.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = SchedulerHandle { shutdown_tx };

        tokio::spawn(self.run(shutdown_rx));

        handle
    }

    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timer = interval(self.config.check_interval);

        info!(
            entries = self.jobs.len(),
            "Starting sync scheduler with check interval {:?}", self.config.check_interval
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let now = self.engine.now();
                    self.tick(now);
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Sync scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cron_rejects_garbage() {
        let err = parse_cron("every night").unwrap_err();
        assert!(matches!(err, VosError::InvalidRequest(_)));
    }

    #[test]
    fn test_default_schedules_parse() {
        for entry in default_schedules() {
            assert!(parse_cron(&entry.cron).is_ok(), "{}", entry.cron);
        }
    }

    #[test]
    fn test_default_cdr_schedule_pulls_one_day() {
        let cdrs = default_schedules()
            .into_iter()
            .find(|e| e.job_type == JobType::Cdrs)
            .unwrap();
        assert_eq!(cdrs.options.effective_days(), 1);
    }

    #[test]
    fn test_schedule_entry_deserializes_without_options() {
        let entry: ScheduleEntry =
            serde_json::from_str(r#"{"job_type": "gateways", "cron": "0 2 * * *"}"#).unwrap();
        assert_eq!(entry.job_type, JobType::Gateways);
        assert_eq!(entry.options, JobOptions::default());
    }
}
