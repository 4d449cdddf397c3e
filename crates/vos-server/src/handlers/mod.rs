//! HTTP handlers.

pub mod cache;
pub mod dataset;
pub mod health;
pub mod instances;
pub mod metrics;
pub mod query;
pub mod sync;
