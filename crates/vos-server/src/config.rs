//! Server configuration.
//!
//! Loaded from an optional YAML file (`VOS_CONFIG` or `vos-cache.yaml`) and
//! overridden by `VOS__*` environment variables, e.g. `VOS__SERVER__PORT=9090`.
//! Everything has a default except the instance list.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vos_core::{InstanceRegistry, TtlPolicy, TtlTier, VosInstance};
use vos_sync::{ScheduleEntry, SchedulerConfig, default_schedules, parse_cron};

use crate::fanout::DEFAULT_MAX_CONCURRENCY;
use crate::resolver::DisabledPolicy;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vos-cache.yaml";

/// Value of `storage.dataset_path` / `storage.cache_path` for a database
/// that lives only as long as the process.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub instances: Vec<VosInstance>,
    /// Extra or replaced TTL tiers, applied over the standard table.
    #[serde(default)]
    pub ttl_overrides: Vec<TtlOverride>,
    #[serde(default)]
    pub fanout: FanoutSettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default = "default_schedules")]
    pub schedules: Vec<ScheduleEntry>,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which [`CacheStore`](crate::cache::CacheStore) backs the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
    #[serde(default)]
    pub cache_backend: CacheBackend,
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// Maximum entries of the in-memory cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

fn default_dataset_path() -> String {
    "data/dataset.db".to_string()
}

fn default_cache_path() -> String {
    "data/cache.db".to_string()
}

fn default_cache_capacity() -> u64 {
    100_000
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            cache_backend: CacheBackend::default(),
            cache_path: default_cache_path(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlOverride {
    pub path: String,
    pub tier: TtlTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutSettings {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverSettings {
    #[serde(default)]
    pub disabled_policy: DisabledPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// How often expired cache entries are purged.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_purge_interval_secs() -> u64 {
    3600
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: default_check_interval_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads `VOS_CONFIG` (or the default file, when present) plus the
    /// environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("VOS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Like [`load`](Self::load) with an explicit file. A missing file is
    /// not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            Environment::with_prefix("VOS")
                .try_parsing(true)
                .separator("__"),
        );
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document without touching the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".into()));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Invalid("upstream.timeout_secs must be > 0".into()));
        }
        if self.fanout.max_concurrency == 0 {
            return Err(ConfigError::Invalid("fanout.max_concurrency must be > 0".into()));
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instance id {}",
                    instance.id
                )));
            }
            if instance.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "instance {} has an empty base_url",
                    instance.id
                )));
            }
        }

        for schedule in &self.schedules {
            parse_cron(&schedule.cron).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Standard tiers plus `ttl_overrides`.
    pub fn ttl_policy(&self) -> TtlPolicy {
        let mut policy = TtlPolicy::standard();
        for o in &self.ttl_overrides {
            policy.insert(&o.path, o.tier);
        }
        policy
    }

    pub fn registry(&self) -> Result<InstanceRegistry, ConfigError> {
        InstanceRegistry::new(self.instances.iter().cloned())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server.host '{}'", self.server.host)))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            check_interval: Duration::from_secs(self.scheduler.check_interval_secs.max(1)),
        }
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.purge_interval_secs.max(60))
    }
}
