//! Synchronization job types and progress snapshots.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VosError;
use crate::instance::InstanceId;
use crate::paths;

/// Kind of bulk synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Customer roster.
    Customers,
    /// Call detail records.
    Cdrs,
    /// Gateway mapping/routing tables.
    Gateways,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Customers, JobType::Cdrs, JobType::Gateways];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Customers => "customers",
            JobType::Cdrs => "cdrs",
            JobType::Gateways => "gateways",
        }
    }

    /// Resource paths whose cached responses overlap with this job's data.
    pub fn cache_family(self) -> &'static [&'static str] {
        match self {
            JobType::Customers => &[paths::GET_ALL_CUSTOMERS, paths::GET_CUSTOMER],
            JobType::Cdrs => &[paths::GET_CDR],
            JobType::Gateways => &[
                paths::GET_GATEWAY_MAPPING,
                paths::GET_GATEWAY_ROUTING,
                paths::GET_GATEWAY_MAPPING_ONLINE,
                paths::GET_GATEWAY_ROUTING_ONLINE,
            ],
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = VosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customers" | "customer" => Ok(JobType::Customers),
            "cdrs" | "cdr" => Ok(JobType::Cdrs),
            "gateways" | "gateway" => Ok(JobType::Gateways),
            other => Err(VosError::invalid(format!("unknown job type '{}'", other))),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = VosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(VosError::invalid(format!("unknown job status '{}'", other))),
        }
    }
}

/// Which gateway tables a gateway sync pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Mapping,
    Routing,
    #[default]
    Both,
}

impl GatewayKind {
    /// Expands `Both` into its parts.
    pub fn parts(self) -> &'static [GatewayKind] {
        match self {
            GatewayKind::Mapping => &[GatewayKind::Mapping],
            GatewayKind::Routing => &[GatewayKind::Routing],
            GatewayKind::Both => &[GatewayKind::Mapping, GatewayKind::Routing],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GatewayKind::Mapping => "mapping",
            GatewayKind::Routing => "routing",
            GatewayKind::Both => "both",
        }
    }
}

/// Maximum day range of a CDR sync.
pub const MAX_CDR_DAYS: u32 = 30;

/// Options accepted by a sync trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// CDR sync: number of days back from today (default 1, max 30).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    /// CDR sync: restrict to a single customer account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    /// Gateway sync: which tables to pull (default both).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_kind: Option<GatewayKind>,
}

impl JobOptions {
    /// Day range clamped to `1..=MAX_CDR_DAYS`.
    pub fn effective_days(&self) -> u32 {
        self.days.unwrap_or(1).clamp(1, MAX_CDR_DAYS)
    }

    pub fn gateway_kind(&self) -> GatewayKind {
        self.gateway_kind.unwrap_or_default()
    }
}

/// Inclusive day range requested from the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl DayWindow {
    /// The `days` days ending today: `[today - days, today]`.
    pub fn ending(today: NaiveDate, days: u32) -> Self {
        let begin = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(today);
        Self { begin, end: today }
    }

    /// `YYYYMMDD` form expected by the upstream.
    pub fn begin_param(&self) -> String {
        self.begin.format("%Y%m%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

/// One bulk synchronization run for one (instance, job type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub instance: InstanceId,
    pub instance_name: String,
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub options: JobOptions,
    #[serde(default)]
    pub window: Option<DayWindow>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Records durably written so far.
    pub synced_count: u64,
    /// Sub-targets (customers, tables) processed so far.
    pub processed: u64,
    /// Number of sub-targets, when knowable.
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub current_sub_target: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SyncJob {
    /// Creates a job in the `running` state.
    pub fn start(
        instance: InstanceId,
        instance_name: impl Into<String>,
        job_type: JobType,
        options: JobOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let window = match job_type {
            JobType::Cdrs => Some(DayWindow::ending(now.date_naive(), options.effective_days())),
            _ => None,
        };
        Self {
            id: Uuid::now_v7(),
            instance,
            instance_name: instance_name.into(),
            job_type,
            status: JobStatus::Running,
            options,
            window,
            started_at: now,
            finished_at: None,
            synced_count: 0,
            processed: 0,
            total: None,
            current_sub_target: None,
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Percentage of sub-targets processed, when the total is known.
    pub fn percent_complete(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed.min(total) as f64 / total as f64) * 100.0
            }
        })
    }

    /// Terminal failure as an error value, if the job failed.
    pub fn failure(&self) -> Option<VosError> {
        if self.status != JobStatus::Failed {
            return None;
        }
        Some(VosError::SyncPartialFailure {
            instance: self.instance,
            job_type: self.job_type,
            committed: self.synced_count,
            reason: self.error.clone().unwrap_or_default(),
        })
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            job_id: Some(self.id),
            instance: self.instance,
            instance_name: self.instance_name.clone(),
            job_type: self.job_type,
            status: self.status,
            current_sub_target: self.current_sub_target.clone(),
            synced_count: self.synced_count,
            processed: self.processed,
            total: self.total,
            percent_complete: self.percent_complete(),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }
}

/// Read-only view of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: Option<Uuid>,
    pub instance: InstanceId,
    pub instance_name: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub current_sub_target: Option<String>,
    pub synced_count: u64,
    pub processed: u64,
    pub total: Option<u64>,
    pub percent_complete: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Status row for a pair that never ran.
    pub fn idle(instance: InstanceId, instance_name: impl Into<String>, job_type: JobType) -> Self {
        Self {
            job_id: None,
            instance,
            instance_name: instance_name.into(),
            job_type,
            status: JobStatus::Idle,
            current_sub_target: None,
            synced_count: 0,
            processed: 0,
            total: None,
            percent_complete: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// What started a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    Manual,
    Scheduled,
}

impl fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerOrigin::Manual => f.write_str("manual"),
            TriggerOrigin::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Outcome of one trigger attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReceipt {
    pub instance: InstanceId,
    pub job_type: JobType,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TriggerReceipt {
    pub fn accepted(instance: InstanceId, job_type: JobType, job_id: Uuid) -> Self {
        Self {
            instance,
            job_type,
            accepted: true,
            job_id: Some(job_id),
            reason: None,
        }
    }

    pub fn rejected(instance: InstanceId, job_type: JobType, reason: impl Into<String>) -> Self {
        Self {
            instance,
            job_type,
            accepted: false,
            job_id: None,
            reason: Some(reason.into()),
        }
    }
}
