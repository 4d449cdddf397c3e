//! Job runners, one per job type.

pub(crate) mod cdrs;
pub(crate) mod customers;
pub(crate) mod gateways;

use std::sync::Arc;

use serde_json::Value;
use vos_core::{Clock, DayWindow, JobOptions, Result, VosInstance};
use vos_upstream::{Upstream, UpstreamRequest};

use crate::dataset::Dataset;
use crate::progress::ProgressReporter;

/// Records per dataset transaction.
pub(crate) const BATCH_SIZE: usize = 200;

/// Everything a runner needs for one job.
pub(crate) struct JobContext {
    pub instance: VosInstance,
    pub upstream: Arc<dyn Upstream>,
    pub dataset: Arc<dyn Dataset>,
    pub clock: Arc<dyn Clock>,
    pub progress: ProgressReporter,
    pub options: JobOptions,
    pub window: Option<DayWindow>,
}

impl JobContext {
    /// One upstream call, errors scoped to this job's instance.
    pub async fn call(&self, path: &str, params: Value) -> Result<Value> {
        let request = UpstreamRequest::new(path, params);
        self.upstream
            .call(&request)
            .await
            .map_err(|e| e.into_vos(self.instance.id))
    }
}
