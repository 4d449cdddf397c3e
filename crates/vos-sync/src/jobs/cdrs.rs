//! Call-record sync.

use serde_json::json;
use tracing::{info, warn};
use vos_core::{DayWindow, Result, VosError, paths};
use vos_upstream::extract;

use super::{JobContext, customers};
use crate::dataset::CdrRecord;

/// Accounts to pull records for: the requested customer, or the whole
/// roster (fetched first when the dataset has none).
async fn target_accounts(ctx: &JobContext) -> Result<Vec<String>> {
    if let Some(customer) = ctx.options.customer.as_deref().map(str::trim)
        && !customer.is_empty()
    {
        return Ok(vec![customer.to_string()]);
    }

    let mut roster = ctx.dataset.customers(ctx.instance.id)?;
    if roster.is_empty() {
        info!(instance = %ctx.instance.id, "Customer roster empty, fetching it first");
        roster = customers::fetch_roster(ctx).await?;
        ctx.dataset.upsert_customers(ctx.instance.id, &roster)?;
    }

    Ok(roster.into_iter().map(|c| c.account).collect())
}

pub(crate) async fn run(ctx: &JobContext) -> Result<()> {
    let window = ctx.window.unwrap_or_else(|| {
        DayWindow::ending(ctx.clock.now().date_naive(), ctx.options.effective_days())
    });
    let accounts = target_accounts(ctx).await?;
    let total = accounts.len();
    ctx.progress.set_total(total);

    for (index, account) in accounts.iter().enumerate() {
        ctx.progress.begin(format!("customer {}/{} ({})", index + 1, total, account));

        let params = json!({
            "accounts": [account],
            "beginTime": window.begin_param(),
            "endTime": window.end_param(),
        });

        let payload = match ctx.call(paths::GET_CDR, params).await {
            Ok(payload) => payload,
            // A per-account rejection (unknown account, no permission) does not
            // stop the rest of the roster.
            Err(VosError::UpstreamRejected { code, message, .. }) => {
                warn!(
                    instance = %ctx.instance.id,
                    account = %account,
                    code = code,
                    error = %message,
                    "Skipping account rejected by upstream"
                );
                ctx.progress.advance(1);
                continue;
            },
            Err(e) => return Err(e),
        };

        let records: Vec<CdrRecord> = extract::records(&payload, paths::GET_CDR)
            .iter()
            .map(|raw| CdrRecord::from_upstream(raw, Some(account)))
            .collect();

        let inserted = ctx.dataset.insert_cdrs(ctx.instance.id, &records)?;
        ctx.progress.record(inserted);
        ctx.progress.advance(1);
    }

    Ok(())
}
