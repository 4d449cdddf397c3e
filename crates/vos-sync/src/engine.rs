//! Sync engine.
//!
//! Dispatches bulk jobs onto background tasks with at most one running job
//! per (instance, job type). Progress lives in memory while a job runs; the
//! latest status of every pair is also persisted in the dataset.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use vos_core::{
    Clock, InstanceId, InstanceRegistry, JobOptions, JobStatus, JobType, ProgressSnapshot, Result,
    SyncJob, SystemClock, TriggerOrigin, TriggerReceipt, VosError, VosInstance,
};
use vos_upstream::{Upstream, UpstreamConnector};

use crate::dataset::Dataset;
use crate::invalidation::{CacheInvalidation, NoopInvalidation};
use crate::jobs::{self, JobContext};
use crate::metrics;
use crate::progress::ProgressReporter;

type JobSlot = Arc<RwLock<SyncJob>>;

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    registry: Arc<InstanceRegistry>,
    connector: Arc<dyn UpstreamConnector>,
    dataset: Arc<dyn Dataset>,
    invalidation: Option<Arc<dyn CacheInvalidation>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SyncEngineBuilder {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        dataset: Arc<dyn Dataset>,
    ) -> Self {
        Self {
            registry,
            connector,
            dataset,
            invalidation: None,
            clock: None,
        }
    }

    /// Hook run after every completed job.
    pub fn invalidation(mut self, invalidation: Arc<dyn CacheInvalidation>) -> Self {
        self.invalidation = Some(invalidation);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SyncEngine {
        SyncEngine {
            inner: Arc::new(EngineInner {
                registry: self.registry,
                connector: self.connector,
                dataset: self.dataset,
                invalidation: self.invalidation.unwrap_or_else(|| Arc::new(NoopInvalidation)),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                jobs: Mutex::new(HashMap::new()),
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }
}

struct EngineInner {
    registry: Arc<InstanceRegistry>,
    connector: Arc<dyn UpstreamConnector>,
    dataset: Arc<dyn Dataset>,
    invalidation: Arc<dyn CacheInvalidation>,
    clock: Arc<dyn Clock>,
    /// Latest job per pair. A running entry here is the single-flight guard.
    jobs: Mutex<HashMap<(InstanceId, JobType), JobSlot>>,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

/// Handle to the sync engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn builder(
        registry: Arc<InstanceRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        dataset: Arc<dyn Dataset>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder::new(registry, connector, dataset)
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.inner.registry
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.inner.dataset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Starts a job for one instance.
    ///
    /// Returns as soon as the job is registered; the work runs on a spawned
    /// task. Fails with [`VosError::SyncAlreadyRunning`] when the same pair
    /// already has a running job, and with [`VosError::InstanceDisabled`]
    /// for disabled instances. Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(instance = %instance_id, job_type = %job_type, origin = %origin))]
    pub fn trigger(
        &self,
        instance_id: InstanceId,
        job_type: JobType,
        options: JobOptions,
        origin: TriggerOrigin,
    ) -> Result<TriggerReceipt> {
        let instance = self.inner.registry.require_enabled(instance_id)?;
        let upstream = self
            .inner
            .connector
            .connect(&instance)
            .map_err(|e| e.into_vos(instance_id))?;

        let (slot, running) = {
            let mut jobs = self.inner.jobs.lock();
            if let Some(existing) = jobs.get(&(instance_id, job_type))
                && existing.read().is_running()
            {
                metrics::record_rejected(job_type);
                debug!("Sync already running, trigger rejected");
                return Err(VosError::SyncAlreadyRunning {
                    instance: instance_id,
                    job_type,
                });
            }

            let job = SyncJob::start(
                instance_id,
                instance.name.clone(),
                job_type,
                options,
                self.inner.clock.now(),
            );
            let slot = Arc::new(RwLock::new(job));
            jobs.insert((instance_id, job_type), slot.clone());
            let running = jobs.values().filter(|j| j.read().is_running()).count();
            (slot, running)
        };

        let job = slot.read().clone();
        if let Err(e) = self.inner.dataset.save_job(&job) {
            warn!(error = %e, "Failed to persist job start");
        }
        metrics::record_started(job_type, running);
        info!(job_id = %job.id, "Sync job started");

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.run(instance, upstream, slot).await });

        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(job.id, handle);

        Ok(TriggerReceipt::accepted(instance_id, job_type, job.id))
    }

    /// Starts `job_type` on every enabled instance.
    ///
    /// One receipt per instance; pairs that are already running come back
    /// rejected without affecting the others.
    pub fn trigger_all(
        &self,
        job_type: JobType,
        options: JobOptions,
        origin: TriggerOrigin,
    ) -> Vec<TriggerReceipt> {
        self.inner
            .registry
            .enabled()
            .into_iter()
            .map(|instance| {
                self.trigger(instance.id, job_type, options.clone(), origin)
                    .unwrap_or_else(|e| TriggerReceipt::rejected(instance.id, job_type, e.to_string()))
            })
            .collect()
    }

    async fn run(&self, instance: VosInstance, upstream: Arc<dyn Upstream>, slot: JobSlot) {
        let started = Instant::now();
        let (job_id, job_type, options, window) = {
            let job = slot.read();
            (job.id, job.job_type, job.options.clone(), job.window)
        };
        let progress = ProgressReporter::new(slot);
        let ctx = JobContext {
            instance,
            upstream,
            dataset: self.inner.dataset.clone(),
            clock: self.inner.clock.clone(),
            progress: progress.clone(),
            options,
            window,
        };

        let body = async {
            match job_type {
                JobType::Customers => jobs::customers::run(&ctx).await,
                JobType::Cdrs => jobs::cdrs::run(&ctx).await,
                JobType::Gateways => jobs::gateways::run(&ctx).await,
            }
        };
        let instance_id = ctx.instance.id;
        // A panicking runner must still release its slot
        let result = AssertUnwindSafe(body).catch_unwind().await.unwrap_or_else(|payload| {
            Err(VosError::SyncPartialFailure {
                instance: instance_id,
                job_type,
                committed: progress.synced_count(),
                reason: format!("job panicked: {}", panic_message(payload.as_ref())),
            })
        });

        let (job, outcome) = match result {
            Ok(()) => {
                let removed = self
                    .inner
                    .invalidation
                    .invalidate_resources(instance_id, job_type.cache_family())
                    .await;
                let job = progress.complete(self.inner.clock.now());
                info!(
                    job_id = %job_id,
                    instance = %instance_id,
                    job_type = %job_type,
                    synced = job.synced_count,
                    invalidated = removed,
                    "Sync job completed"
                );
                (job, "completed")
            },
            Err(e) => {
                let job = progress.fail(self.inner.clock.now(), &e);
                error!(
                    job_id = %job_id,
                    instance = %instance_id,
                    job_type = %job_type,
                    synced = job.synced_count,
                    error = %e,
                    "Sync job failed"
                );
                (job, "failed")
            },
        };

        if let Err(e) = self.inner.dataset.save_job(&job) {
            warn!(job_id = %job_id, error = %e, "Failed to persist job status");
        }
        metrics::record_finished(job_type, outcome, started.elapsed(), self.running_count());
    }

    /// Waits for a job's task to finish and returns its final state.
    pub async fn wait(&self, job_id: Uuid) -> Option<SyncJob> {
        let handle = self.inner.tasks.lock().remove(&job_id);
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(job_id = %job_id, error = %e, "Sync task ended abnormally");
        }
        self.job(job_id)
    }

    /// Waits for every job started so far.
    pub async fn wait_all(&self) {
        let handles: Vec<_> = self.inner.tasks.lock().drain().collect();
        for (job_id, handle) in handles {
            if let Err(e) = handle.await {
                warn!(job_id = %job_id, error = %e, "Sync task ended abnormally");
            }
        }
    }

    /// Latest in-memory state of a job, if it is still the newest for its pair.
    pub fn job(&self, job_id: Uuid) -> Option<SyncJob> {
        self.inner
            .jobs
            .lock()
            .values()
            .map(|slot| slot.read())
            .find(|job| job.id == job_id)
            .map(|job| job.clone())
    }

    /// Latest job of a pair: in memory first, then the persisted row.
    pub fn status(&self, instance: InstanceId, job_type: JobType) -> Result<Option<SyncJob>> {
        if let Some(slot) = self.inner.jobs.lock().get(&(instance, job_type)) {
            return Ok(Some(slot.read().clone()));
        }
        Ok(self
            .inner
            .dataset
            .job_statuses()?
            .into_iter()
            .find(|job| job.instance == instance && job.job_type == job_type))
    }

    /// Snapshots of running jobs.
    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        let mut running: Vec<ProgressSnapshot> = self
            .inner
            .jobs
            .lock()
            .values()
            .map(|slot| slot.read().snapshot())
            .filter(|s| s.status == JobStatus::Running)
            .collect();
        running.sort_by_key(|s| (s.instance, s.job_type));
        running
    }

    /// One status per configured instance and job type.
    ///
    /// Pairs that never ran come back `idle`.
    pub fn statuses(&self) -> Result<Vec<ProgressSnapshot>> {
        let mut persisted: HashMap<(InstanceId, JobType), SyncJob> = self
            .inner
            .dataset
            .job_statuses()?
            .into_iter()
            .map(|job| ((job.instance, job.job_type), job))
            .collect();
        let jobs = self.inner.jobs.lock();

        let mut statuses = Vec::new();
        for instance in self.inner.registry.all() {
            for job_type in JobType::ALL {
                let key = (instance.id, job_type);
                let snapshot = match jobs.get(&key) {
                    Some(slot) => slot.read().snapshot(),
                    None => match persisted.remove(&key) {
                        Some(job) => job.snapshot(),
                        None => ProgressSnapshot::idle(instance.id, instance.name.clone(), job_type),
                    },
                };
                statuses.push(snapshot);
            }
        }
        Ok(statuses)
    }

    pub fn running_count(&self) -> usize {
        self.inner
            .jobs
            .lock()
            .values()
            .filter(|slot| slot.read().is_running())
            .count()
    }

    pub fn is_syncing(&self) -> bool {
        self.running_count() > 0
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("instances", &self.inner.registry.len())
            .field("running", &self.running_count())
            .finish()
    }
}
