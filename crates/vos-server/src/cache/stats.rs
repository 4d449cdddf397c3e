//! Cache statistics and expired-entry cleanup.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use vos_core::{Freshness, InstanceId, TtlPolicy, paths};

use super::store::{CacheEntry, CacheError, CacheStore};

/// How long an entry is kept past its tier before it counts as invalid and
/// becomes eligible for cleanup.
pub const GRACE_PERIOD: Duration = Duration::from_secs(7 * 24 * 3600);

/// Entry count of one API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiCount {
    pub api: String,
    pub count: u64,
}

/// Cache statistics at one instant.
///
/// `valid + expired == total`; `invalid` counts the expired entries that are
/// also past the grace period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub valid: u64,
    pub expired: u64,
    pub invalid: u64,
    pub by_api: Vec<ApiCount>,
}

impl CacheStats {
    /// Classifies every entry against the policy using a single `now`.
    pub fn compute(entries: &[CacheEntry], policy: &TtlPolicy, now: DateTime<Utc>) -> Self {
        let mut stats = CacheStats::default();
        let mut by_api: BTreeMap<&str, u64> = BTreeMap::new();

        for entry in entries {
            stats.total += 1;
            let path = entry.key.resource_path();
            match policy.freshness(path, entry.fetched_at, now) {
                Freshness::Valid => stats.valid += 1,
                Freshness::Expired => {
                    stats.expired += 1;
                    if is_past_grace(entry, policy, now) {
                        stats.invalid += 1;
                    }
                },
            }
            *by_api.entry(paths::api_name(path)).or_default() += 1;
        }

        stats.by_api = by_api
            .into_iter()
            .map(|(api, count)| ApiCount {
                api: api.to_string(),
                count,
            })
            .collect();
        stats
    }
}

fn is_past_grace(entry: &CacheEntry, policy: &TtlPolicy, now: DateTime<Utc>) -> bool {
    entry.age(now) >= policy.lifetime_for(entry.key.resource_path()) + GRACE_PERIOD
}

/// Computes statistics for one instance, or the whole store.
pub async fn collect_stats(
    store: &dyn CacheStore,
    instance: Option<InstanceId>,
    policy: &TtlPolicy,
    now: DateTime<Utc>,
) -> Result<CacheStats, CacheError> {
    let entries = store.entries(instance).await?;
    Ok(CacheStats::compute(&entries, policy, now))
}

/// Removes entries whose age exceeds their tier by more than `grace`.
pub async fn purge_expired(
    store: &dyn CacheStore,
    policy: &TtlPolicy,
    now: DateTime<Utc>,
    grace: Duration,
) -> Result<usize, CacheError> {
    let mut removed = 0;
    for entry in store.entries(None).await? {
        let limit = policy.lifetime_for(entry.key.resource_path()) + grace;
        if entry.age(now) >= limit && store.remove(&entry.key).await? {
            removed += 1;
        }
    }

    if removed > 0 {
        info!(count = removed, "Purged expired cache entries");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use serde_json::json;
    use vos_core::CacheKey;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn entry(path: &str, fetched_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry::new(CacheKey::new(InstanceId::new(1), path, &json!({})), json!({}), fetched_at)
    }

    #[test]
    fn test_stats_boundary_counts_as_expired() {
        let policy = TtlPolicy::standard();
        let now = t0() + TimeDelta::seconds(30);
        let entries = vec![
            entry(paths::GET_GATEWAY_MAPPING_ONLINE, t0()),
            entry(paths::GET_CURRENT_CALL, t0() + TimeDelta::seconds(1)),
        ];

        let stats = CacheStats::compute(&entries, &policy, now);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid, 0);
    }

    #[test]
    fn test_stats_group_by_api() {
        let policy = TtlPolicy::standard();
        let entries = vec![
            entry(paths::GET_CDR, t0()),
            entry(paths::GET_CDR, t0()),
            entry(paths::GET_SUITE, t0()),
        ];
        let stats = CacheStats::compute(&entries, &policy, t0());
        assert_eq!(
            stats.by_api,
            vec![
                ApiCount { api: "GetCdr".to_string(), count: 2 },
                ApiCount { api: "GetSuite".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_stats_invalid_past_grace() {
        let policy = TtlPolicy::standard();
        let now = t0() + TimeDelta::days(8);
        let stats = CacheStats::compute(&[entry(paths::GET_CURRENT_CALL, t0())], &policy, now);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.invalid, 1);
    }

    #[test]
    fn test_repeated_stats_agree() {
        let policy = TtlPolicy::standard();
        let entries: Vec<_> = (0..50)
            .map(|i| entry(paths::GET_CURRENT_CALL, t0() - TimeDelta::seconds(i)))
            .collect();
        let now = t0() + TimeDelta::seconds(10);
        assert_eq!(
            CacheStats::compute(&entries, &policy, now),
            CacheStats::compute(&entries, &policy, now)
        );
    }
}
