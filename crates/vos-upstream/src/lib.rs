//! # VOS Upstream
//!
//! Client side of the VOS management API.
//!
//! ## Features
//!
//! - Async [`Upstream`] trait over one instance's API
//! - HTTP implementation ([`VosClient`]) with `retCode` interpretation
//! - [`UpstreamConnector`] to obtain a client per configured instance
//! - Record-list extraction from VOS payloads
//!
//! ## Example
//!
//! ```ignore
//! use vos_upstream::{HttpConnector, UpstreamConnector, UpstreamRequest};
//!
//! let connector = HttpConnector::new(Duration::from_secs(30))?;
//! let upstream = connector.connect(&instance)?;
//!
//! let request = UpstreamRequest::new("GetAllCustomers", json!({"type": 1}));
//! let payload = upstream.call(&request).await?;
//! let customers = vos_upstream::extract::records(&payload, request.path());
//! ```

pub mod client;
pub mod error;
pub mod extract;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod source;

// Re-exports
pub use client::{DEFAULT_TIMEOUT, HttpConnector, MISSING_RET_CODE, VosClient, interpret_response};
pub use error::UpstreamError;
pub use source::{Upstream, UpstreamConnector, UpstreamRequest};

// Re-export vos_core for consumers
pub use vos_core;
