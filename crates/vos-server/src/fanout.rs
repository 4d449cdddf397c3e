//! Concurrent reads across every enabled instance.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use vos_core::{DataSource, InstanceId, InstanceRegistry, VosInstance, paths};
use vos_upstream::extract;

use crate::resolver::FreshnessResolver;

/// Default number of instances queried at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Outcome for one instance of a fan-out query.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    pub instance_id: InstanceId,
    pub instance_name: String,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merged records plus one outcome row per queried instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FanoutResult {
    pub results: Vec<Value>,
    pub per_instance: Vec<InstanceOutcome>,
}

impl FanoutResult {
    pub fn succeeded(&self) -> usize {
        self.per_instance.iter().filter(|o| o.success).count()
    }
}

/// Runs one read against every enabled instance.
pub struct QueryFanout {
    resolver: Arc<FreshnessResolver>,
    registry: Arc<InstanceRegistry>,
    max_concurrency: usize,
}

impl QueryFanout {
    pub fn new(resolver: Arc<FreshnessResolver>, registry: Arc<InstanceRegistry>) -> Self {
        Self {
            resolver,
            registry,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Resolves the read on every enabled instance.
    ///
    /// Never fails as a whole: each instance's error is reported in its
    /// outcome row. Object records are tagged with `_instance_id`; records of
    /// one instance keep their upstream order, instances follow id order.
    #[instrument(skip_all, fields(resource_path = %resource_path))]
    pub async fn query_all(&self, resource_path: &str, params: &Value, force_refresh: bool) -> FanoutResult {
        let path = paths::normalize(resource_path);
        let instances = self.registry.enabled();

        let mut outcomes: Vec<(InstanceOutcome, Vec<Value>)> = stream::iter(instances)
            .map(|instance| self.query_one(instance, &path, params, force_refresh))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(outcome, _)| outcome.instance_id);

        let mut result = FanoutResult::default();
        for (outcome, records) in outcomes {
            result.results.extend(records);
            result.per_instance.push(outcome);
        }

        info!(
            instances = result.per_instance.len(),
            succeeded = result.succeeded(),
            records = result.results.len(),
            "Fan-out query finished"
        );
        result
    }

    async fn query_one(
        &self,
        instance: VosInstance,
        path: &str,
        params: &Value,
        force_refresh: bool,
    ) -> (InstanceOutcome, Vec<Value>) {
        match self.resolver.resolve(instance.id, path, params, force_refresh).await {
            Ok(resolution) => {
                let records: Vec<Value> = extract::records(&resolution.payload, path)
                    .iter()
                    .map(|record| tag(record, instance.id))
                    .collect();
                let outcome = InstanceOutcome {
                    instance_id: instance.id,
                    instance_name: instance.name,
                    count: records.len(),
                    success: true,
                    data_source: Some(resolution.source),
                    stale: resolution.stale,
                    error: None,
                };
                (outcome, records)
            },
            Err(e) => {
                warn!(instance = %instance.id, error = %e, "Fan-out query failed for instance");
                let outcome = InstanceOutcome {
                    instance_id: instance.id,
                    instance_name: instance.name,
                    count: 0,
                    success: false,
                    data_source: None,
                    stale: false,
                    error: Some(e.to_string()),
                };
                (outcome, Vec::new())
            },
        }
    }
}

fn tag(record: &Value, instance: InstanceId) -> Value {
    match record {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.insert("_instance_id".to_string(), Value::from(instance.get()));
            Value::Object(fields)
        },
        other => other.clone(),
    }
}
