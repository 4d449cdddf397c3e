#![allow(dead_code)]
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};
use vos_sync::{CacheInvalidation, SqliteDataset, SyncEngine};
use vos_upstream::fixtures::{FixtureConnector, FixtureUpstream};
use vos_upstream::vos_core::{InstanceId, InstanceRegistry, ManualClock, VosInstance, paths};

pub const MAIN: InstanceId = InstanceId::new(1);
pub const BACKUP: InstanceId = InstanceId::new(2);
pub const RETIRED: InstanceId = InstanceId::new(3);

/// Records every invalidation request the engine makes.
#[derive(Default)]
pub struct RecordingInvalidation {
    pub calls: Mutex<Vec<(InstanceId, Vec<String>)>>,
}

#[async_trait]
impl CacheInvalidation for RecordingInvalidation {
    async fn invalidate_resources(&self, instance: InstanceId, resource_paths: &[&str]) -> usize {
        self.calls
            .lock()
            .push((instance, resource_paths.iter().map(|p| p.to_string()).collect()));
        resource_paths.len()
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub connector: Arc<FixtureConnector>,
    pub dataset: Arc<SqliteDataset>,
    pub clock: Arc<ManualClock>,
    pub invalidation: Arc<RecordingInvalidation>,
}

impl Harness {
    pub fn upstream(&self, id: InstanceId) -> Arc<FixtureUpstream> {
        self.connector.upstream(id)
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 0, 59, 0).unwrap()
}

/// Two enabled instances and one disabled one.
pub fn registry() -> Arc<InstanceRegistry> {
    Arc::new(
        InstanceRegistry::new([
            VosInstance::new(1u32, "main", "http://vos-main.local"),
            VosInstance::new(2u32, "backup", "http://vos-backup.local"),
            VosInstance::new(3u32, "retired", "http://vos-old.local").with_enabled(false),
        ])
        .unwrap(),
    )
}

pub fn harness() -> Harness {
    harness_with(Arc::new(SqliteDataset::open_in_memory().unwrap()))
}

pub fn harness_with(dataset: Arc<SqliteDataset>) -> Harness {
    let connector = Arc::new(FixtureConnector::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let invalidation = Arc::new(RecordingInvalidation::default());
    let engine = SyncEngine::builder(registry(), connector.clone(), dataset.clone())
        .invalidation(invalidation.clone())
        .clock(clock.clone())
        .build();

    Harness {
        engine,
        connector,
        dataset,
        clock,
        invalidation,
    }
}

pub fn roster(accounts: &[&str]) -> Value {
    let briefs: Vec<Value> = accounts
        .iter()
        .map(|a| json!({"account": a, "money": 10.5, "limitMoney": 0}))
        .collect();
    json!({"retCode": 0, "infoCustomerBriefs": briefs})
}

pub fn cdrs(account: &str, count: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "callerE164": format!("{}00{}", account, i),
                "calleeE164": "5551234",
                "startTime": format!("2026-03-09 10:0{}:00", i),
                "duration": 30 + i,
                "fee": 0.12,
            })
        })
        .collect();
    json!({"retCode": 0, "infoCdrs": records})
}

/// Scripts `GetCdr` per requested account.
pub fn cdrs_by_account<F>(upstream: &FixtureUpstream, responder: F)
where
    F: Fn(&str) -> Result<Value, vos_upstream::UpstreamError> + Send + Sync + 'static,
{
    upstream.respond_with(paths::GET_CDR, move |request| {
        let account = request.params()["accounts"][0].as_str().unwrap_or_default().to_string();
        responder(&account).and_then(vos_upstream::interpret_response)
    });
}
