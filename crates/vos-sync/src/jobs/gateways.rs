//! Gateway mapping/routing sync.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::warn;
use vos_core::{GatewayKind, Result, paths};
use vos_upstream::extract;

use super::JobContext;
use crate::dataset::GatewayRecord;

fn endpoints(kind: GatewayKind) -> (&'static str, &'static str) {
    match kind {
        GatewayKind::Mapping => (paths::GET_GATEWAY_MAPPING, paths::GET_GATEWAY_MAPPING_ONLINE),
        GatewayKind::Routing | GatewayKind::Both => {
            (paths::GET_GATEWAY_ROUTING, paths::GET_GATEWAY_ROUTING_ONLINE)
        },
    }
}

pub(crate) async fn run(ctx: &JobContext) -> Result<()> {
    let kinds = ctx.options.gateway_kind().parts();
    ctx.progress.set_total(kinds.len());

    for &kind in kinds {
        let (definitions_path, online_path) = endpoints(kind);
        ctx.progress.begin(format!("{} gateways", kind.as_str()));

        let definitions = ctx.call(definitions_path, json!({"names": []})).await?;

        // Online status is best effort; definitions alone are still worth storing.
        let online = match ctx.call(online_path, json!({"names": []})).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    instance = %ctx.instance.id,
                    kind = kind.as_str(),
                    error = %e,
                    "Gateway online status unavailable"
                );
                None
            },
        };

        let online_by_name: HashMap<&str, &Value> = online
            .as_ref()
            .map(|payload| {
                extract::records(payload, online_path)
                    .iter()
                    .filter_map(|r| r.get("name").and_then(Value::as_str).map(|n| (n, r)))
                    .collect()
            })
            .unwrap_or_default();

        let synced_at = ctx.clock.now();
        let records: Vec<GatewayRecord> = extract::records(&definitions, definitions_path)
            .iter()
            .filter_map(|definition| {
                let status = definition
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(|name| online_by_name.get(name).copied());
                GatewayRecord::from_upstream(definition, status, kind, synced_at)
            })
            .collect();

        let written = ctx.dataset.upsert_gateways(ctx.instance.id, &records)?;
        ctx.progress.record(written);
        ctx.progress.advance(1);
    }

    Ok(())
}
