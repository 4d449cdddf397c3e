//! In-process upstream fixtures.
//!
//! Enabled by the `fixtures` feature. Dependent crates use these in their
//! tests to script VOS responses without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use vos_core::{InstanceId, VosInstance, paths};

use crate::client::interpret_response;
use crate::error::UpstreamError;
use crate::source::{Upstream, UpstreamConnector, UpstreamRequest};

type Responder = Arc<dyn Fn(&UpstreamRequest) -> Result<Value, UpstreamError> + Send + Sync>;

/// Scripted upstream.
///
/// Unscripted paths answer with a rejection, so a test notices calls it did
/// not expect.
pub struct FixtureUpstream {
    name: String,
    routes: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<UpstreamRequest>>,
    delay: Mutex<Option<Duration>>,
    paused: watch::Sender<bool>,
}

impl FixtureUpstream {
    pub fn new(name: impl Into<String>) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            name: name.into(),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            paused,
        }
    }

    /// Answers every call to `path` with `payload` (after `retCode` handling).
    pub fn respond(&self, path: &str, payload: Value) {
        self.respond_with(path, move |_| interpret_response(payload.clone()));
    }

    /// Answers every call to `path` with `error`.
    pub fn fail(&self, path: &str, error: UpstreamError) {
        self.respond_with(path, move |_| Err(error.clone()));
    }

    /// Answers calls to `path` with a closure over the request.
    pub fn respond_with<F>(&self, path: &str, responder: F)
    where
        F: Fn(&UpstreamRequest) -> Result<Value, UpstreamError> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .insert(paths::normalize(path), Arc::new(responder));
    }

    /// Delays every call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Blocks calls until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received for `path`.
    pub fn call_count(&self, path: &str) -> usize {
        let path = paths::normalize(path);
        self.calls.lock().iter().filter(|r| r.path() == path).count()
    }

    async fn wait_resumed(&self) {
        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[async_trait]
impl Upstream for FixtureUpstream {
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        self.calls.lock().push(request.clone());

        self.wait_resumed().await;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let responder = self.routes.lock().get(request.path()).cloned();
        match responder {
            Some(responder) => responder(request),
            None => Err(UpstreamError::rejected(
                -99,
                format!("no fixture for {}", request.path()),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Connector handing out one [`FixtureUpstream`] per instance.
#[derive(Default)]
pub struct FixtureConnector {
    upstreams: Mutex<HashMap<InstanceId, Arc<FixtureUpstream>>>,
}

impl FixtureConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixture behind an instance, created on first use.
    pub fn upstream(&self, instance: InstanceId) -> Arc<FixtureUpstream> {
        self.upstreams
            .lock()
            .entry(instance)
            .or_insert_with(|| Arc::new(FixtureUpstream::new(format!("fixture-{}", instance))))
            .clone()
    }
}

impl UpstreamConnector for FixtureConnector {
    fn connect(&self, instance: &VosInstance) -> Result<Arc<dyn Upstream>, UpstreamError> {
        Ok(self.upstream(instance.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_response() {
        let upstream = FixtureUpstream::new("f");
        upstream.respond(paths::GET_SUITE, json!({"retCode": 0, "infoSuites": []}));

        let request = UpstreamRequest::new("GetSuite", json!({}));
        assert!(upstream.call(&request).await.is_ok());
        assert_eq!(upstream.call_count(paths::GET_SUITE), 1);
    }

    #[tokio::test]
    async fn test_scripted_ret_code_is_rejected() {
        let upstream = FixtureUpstream::new("f");
        upstream.respond(paths::GET_CDR, json!({"retCode": -1, "exception": "busy"}));

        let err = upstream
            .call(&UpstreamRequest::new(paths::GET_CDR, json!({})))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::rejected(-1, "busy"));
    }

    #[tokio::test]
    async fn test_unscripted_path_is_rejected() {
        let upstream = FixtureUpstream::new("f");
        let result = upstream
            .call(&UpstreamRequest::new("GetPhone", json!({})))
            .await;
        assert!(matches!(result, Err(UpstreamError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let upstream = Arc::new(FixtureUpstream::new("f"));
        upstream.respond(paths::GET_SUITE, json!({"retCode": 0}));
        upstream.pause();

        let task = {
            let upstream = Arc::clone(&upstream);
            tokio::spawn(async move {
                upstream
                    .call(&UpstreamRequest::new(paths::GET_SUITE, json!({})))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        upstream.resume();
        assert!(task.await.unwrap().is_ok());
    }

    #[test]
    fn test_connector_reuses_fixture() {
        let connector = FixtureConnector::new();
        let a = connector.upstream(InstanceId::new(1));
        let b = connector.upstream(InstanceId::new(1));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
