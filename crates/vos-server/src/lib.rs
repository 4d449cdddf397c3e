//! # VOS Server
//!
//! HTTP front of the VOS cache and sync layer.
//!
//! ## Features
//!
//! - Tiered response cache (Moka in memory or SQLite on disk)
//! - [`FreshnessResolver`]: cache first, upstream on miss, stale entry on failure
//! - [`QueryFanout`]: one read across every enabled instance
//! - Sync triggers, progress polling and synced dataset reads
//! - Prometheus metrics, request ids and structured request logging

pub mod cache;
pub mod config;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod resolver;
pub mod server;
pub mod state;

// Re-exports
pub use config::{CacheBackend, ConfigError, ServerConfig};
pub use error::AppError;
pub use fanout::{FanoutResult, InstanceOutcome, QueryFanout};
pub use resolver::{DisabledPolicy, FreshnessResolver, Resolution};
pub use server::{create_router, create_router_with_state, run_server_with_state};
pub use state::{AppState, StateOptions};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
