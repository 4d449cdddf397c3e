//! Upstream abstraction.
//!
//! This module defines the core traits for reaching VOS instances and the
//! request type they accept.

mod request;
mod traits;

pub use request::UpstreamRequest;
pub use traits::{Upstream, UpstreamConnector};
