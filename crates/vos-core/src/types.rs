//! Shared value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a response was served from.
///
/// The serialized names are the ones the dashboard already understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// The response cache.
    #[serde(rename = "database")]
    Cache,
    /// A fresh upstream call.
    #[serde(rename = "vos_api")]
    Upstream,
    /// The durable synced dataset.
    #[serde(rename = "clickhouse")]
    Dataset,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Cache => "database",
            DataSource::Upstream => "vos_api",
            DataSource::Dataset => "clickhouse",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
