//! Customer roster sync.

use serde_json::json;
use tracing::{debug, info};
use vos_core::{Result, paths};
use vos_upstream::extract;

use super::{BATCH_SIZE, JobContext};
use crate::dataset::CustomerRecord;

/// Fetches the full roster of the job's instance.
pub(crate) async fn fetch_roster(ctx: &JobContext) -> Result<Vec<CustomerRecord>> {
    let payload = ctx.call(paths::GET_ALL_CUSTOMERS, json!({"type": 1})).await?;
    let synced_at = ctx.clock.now();
    let roster: Vec<CustomerRecord> = extract::records(&payload, paths::GET_ALL_CUSTOMERS)
        .iter()
        .filter_map(|raw| CustomerRecord::from_upstream(raw, synced_at))
        .collect();

    debug!(instance = %ctx.instance.id, count = roster.len(), "Customer roster fetched");
    Ok(roster)
}

pub(crate) async fn run(ctx: &JobContext) -> Result<()> {
    let roster = fetch_roster(ctx).await?;
    let total = roster.len();
    ctx.progress.set_total(total);

    if roster.is_empty() {
        info!(instance = %ctx.instance.id, "Upstream returned an empty customer roster");
        return Ok(());
    }

    for (index, batch) in roster.chunks(BATCH_SIZE).enumerate() {
        let done = index * BATCH_SIZE + batch.len();
        ctx.progress.begin(format!("customer {}/{}", done, total));
        let written = ctx.dataset.upsert_customers(ctx.instance.id, batch)?;
        ctx.progress.record(written);
        ctx.progress.advance(batch.len());
    }

    Ok(())
}
