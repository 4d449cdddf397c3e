//! Estado completo de la aplicacion sobre fixtures en memoria.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use vos_core::{InstanceId, InstanceRegistry, ManualClock, VosInstance};
use vos_server::cache::{CacheStore, MemoryCacheConfig, MemoryStore};
use vos_server::metrics::{CacheMetrics, detached_handle};
use vos_server::{AppState, DisabledPolicy, StateOptions, create_router_with_state};
use vos_sync::SqliteDataset;
use vos_upstream::fixtures::{FixtureConnector, FixtureUpstream};

use super::client::TestClient;

pub const MAIN: InstanceId = InstanceId::new(1);
pub const BACKUP: InstanceId = InstanceId::new(2);
pub const RETIRED: InstanceId = InstanceId::new(3);

pub struct TestApp {
    pub state: AppState,
    pub client: TestClient,
    pub connector: Arc<FixtureConnector>,
    pub store: Arc<MemoryStore>,
    pub dataset: Arc<SqliteDataset>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn upstream(&self, id: InstanceId) -> Arc<FixtureUpstream> {
        self.connector.upstream(id)
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub fn registry() -> InstanceRegistry {
    InstanceRegistry::new([
        VosInstance::new(1u32, "main", "http://vos-main.local"),
        VosInstance::new(2u32, "backup", "http://vos-backup.local"),
        VosInstance::new(3u32, "retired", "http://vos-old.local").with_enabled(false),
    ])
    .unwrap()
}

pub fn app() -> TestApp {
    app_with(DisabledPolicy::Reject)
}

pub fn app_with(disabled_policy: DisabledPolicy) -> TestApp {
    let connector = Arc::new(FixtureConnector::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(MemoryStore::new(MemoryCacheConfig::default(), CacheMetrics::new()));
    let dataset = Arc::new(SqliteDataset::open_in_memory().unwrap());

    let state = AppState::new(
        Arc::new(registry()),
        connector.clone(),
        store.clone() as Arc<dyn CacheStore>,
        dataset.clone(),
        StateOptions {
            disabled_policy,
            clock: clock.clone(),
            ..StateOptions::default()
        },
    );
    let client = TestClient::new(create_router_with_state(state.clone(), detached_handle()));

    TestApp {
        state,
        client,
        connector,
        store,
        dataset,
        clock,
    }
}

/// Payload de GetAllCustomers.
pub fn roster(accounts: &[&str]) -> Value {
    let briefs: Vec<Value> = accounts
        .iter()
        .map(|a| json!({"account": a, "money": 10.0, "limitMoney": 0.0}))
        .collect();
    json!({"retCode": 0, "infoCustomerBriefs": briefs})
}

/// Payload de GetGatewayMappingOnline.
pub fn online_gateways(names: &[&str]) -> Value {
    let infos: Vec<Value> = names
        .iter()
        .map(|n| json!({"name": n, "isOnline": 1}))
        .collect();
    json!({"retCode": 0, "infoGatewayMappingsOnline": infos})
}
