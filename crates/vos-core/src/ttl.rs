//! Tiered cache lifetimes.
//!
//! Every resource path belongs to exactly one [`TtlTier`]. The mapping is
//! plain data held in a [`TtlPolicy`]; unknown paths fall into the shortest
//! tier so that an unclassified resource is refreshed too often rather than
//! served stale.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Cache lifetime class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlTier {
    /// Live call state, online status, performance, current alarms.
    RealTime,
    /// Customer and phone rosters.
    NearLive,
    /// Call records, payment history, consumption.
    Historical,
    /// Rate plans, gateway definitions, packages, switch settings.
    Configuration,
}

impl TtlTier {
    pub const ALL: [TtlTier; 4] = [
        TtlTier::RealTime,
        TtlTier::NearLive,
        TtlTier::Historical,
        TtlTier::Configuration,
    ];

    /// Lifetime of entries in this tier.
    pub const fn duration(self) -> Duration {
        match self {
            TtlTier::RealTime => Duration::from_secs(30),
            TtlTier::NearLive => Duration::from_secs(5 * 60),
            TtlTier::Historical => Duration::from_secs(60 * 60),
            TtlTier::Configuration => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TtlTier::RealTime => "real_time",
            TtlTier::NearLive => "near_live",
            TtlTier::Historical => "historical",
            TtlTier::Configuration => "configuration",
        }
    }
}

impl fmt::Display for TtlTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default classification of the VOS management API.
const STANDARD_TIERS: &[(&str, TtlTier)] = &[
    (paths::GET_PHONE_ONLINE, TtlTier::RealTime),
    (paths::GET_ALL_PHONE_ONLINE, TtlTier::RealTime),
    (paths::GET_CURRENT_CALL, TtlTier::RealTime),
    (paths::GET_GATEWAY_MAPPING_ONLINE, TtlTier::RealTime),
    (paths::GET_GATEWAY_ROUTING_ONLINE, TtlTier::RealTime),
    (paths::GET_PERFORMANCE, TtlTier::RealTime),
    (paths::GET_ALARM_CURRENT, TtlTier::RealTime),
    (paths::GET_ALL_CUSTOMERS, TtlTier::NearLive),
    (paths::GET_CUSTOMER, TtlTier::NearLive),
    (paths::GET_PHONE, TtlTier::NearLive),
    (paths::GET_CDR, TtlTier::Historical),
    (paths::GET_PAY_HISTORY, TtlTier::Historical),
    (paths::GET_CONSUMPTION, TtlTier::Historical),
    (paths::GET_GATEWAY_MAPPING, TtlTier::Configuration),
    (paths::GET_GATEWAY_ROUTING, TtlTier::Configuration),
    (paths::GET_FEE_RATE_GROUP, TtlTier::Configuration),
    (paths::GET_FEE_RATE, TtlTier::Configuration),
    (paths::GET_SUITE, TtlTier::Configuration),
    (paths::GET_SOFT_SWITCH, TtlTier::Configuration),
    (paths::GET_E164_CONVERT, TtlTier::Configuration),
    (paths::GET_IVR_AUDIO, TtlTier::Configuration),
];

/// Freshness verdict for a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Valid,
    Expired,
}

/// Mapping from resource path to [`TtlTier`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use vos_core::{TtlPolicy, TtlTier};
///
/// let policy = TtlPolicy::standard().with_tier("/custom/Report", TtlTier::Historical);
/// assert_eq!(policy.lifetime_for("/custom/Report"), Duration::from_secs(3600));
/// assert_eq!(policy.tier_for("/never/seen"), TtlTier::RealTime);
/// ```
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: HashMap<String, TtlTier>,
    fallback: TtlTier,
}

impl TtlPolicy {
    /// An empty table: every path falls back to the shortest tier.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
            fallback: TtlTier::RealTime,
        }
    }

    /// The standard VOS classification.
    pub fn standard() -> Self {
        let mut policy = Self::empty();
        for (path, tier) in STANDARD_TIERS {
            policy.insert(path, *tier);
        }
        policy
    }

    /// Adds or replaces the tier of a path.
    pub fn insert(&mut self, path: &str, tier: TtlTier) {
        self.table.insert(paths::normalize(path), tier);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_tier(mut self, path: &str, tier: TtlTier) -> Self {
        self.insert(path, tier);
        self
    }

    /// Tier of a resource path. Never fails.
    pub fn tier_for(&self, path: &str) -> TtlTier {
        self.table
            .get(&paths::normalize(path))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Cache lifetime of a resource path.
    pub fn lifetime_for(&self, path: &str) -> Duration {
        self.tier_for(path).duration()
    }

    /// Evaluates an entry fetched at `fetched_at` against `now`.
    ///
    /// An entry is valid iff its age is strictly below the lifetime; an age
    /// equal to the lifetime is already expired.
    pub fn freshness(&self, path: &str, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> Freshness {
        if age(fetched_at, now) < self.lifetime_for(path) {
            Freshness::Valid
        } else {
            Freshness::Expired
        }
    }

    pub fn is_fresh(&self, path: &str, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.freshness(path, fetched_at, now) == Freshness::Valid
    }

    /// Number of explicitly classified paths.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Age of an entry. Timestamps in the future count as age zero.
pub fn age(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(fetched_at)
        .to_std()
        .unwrap_or_default()
}
