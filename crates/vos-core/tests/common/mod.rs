#![allow(dead_code)]
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use vos_core::{InstanceRegistry, VosInstance};

/// Fixed reference instant for freshness checks.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

/// `secs` seconds before [`noon`].
pub fn secs_before_noon(secs: i64) -> DateTime<Utc> {
    noon() - TimeDelta::seconds(secs)
}

/// Registry with two enabled instances and one disabled.
pub fn registry() -> InstanceRegistry {
    InstanceRegistry::new([
        VosInstance::new(1u32, "main", "http://vos-main.local"),
        VosInstance::new(2u32, "backup", "http://vos-backup.local"),
        VosInstance::new(3u32, "retired", "http://vos-old.local").with_enabled(false),
    ])
    .expect("Failed to build test registry")
}
