mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use vos_sync::{CdrQuery, Dataset, SqliteDataset};
use vos_upstream::UpstreamError;
use vos_upstream::vos_core::{
    GatewayKind, JobOptions, JobStatus, JobType, TriggerOrigin, VosError, paths,
};

#[tokio::test]
async fn test_customer_sync_writes_roster_and_invalidates() {
    let h = harness();
    h.upstream(MAIN)
        .respond(paths::GET_ALL_CUSTOMERS, roster(&["1001", "1002", "1003"]));

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    assert!(receipt.accepted);

    let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.synced_count, 3);
    assert_eq!(job.percent_complete(), Some(100.0));

    let customers = h.dataset.customers(MAIN).unwrap();
    assert_eq!(customers.len(), 3);

    let calls = h.invalidation.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, MAIN);
    assert!(calls[0].1.iter().any(|p| p == paths::GET_ALL_CUSTOMERS));
}

#[tokio::test]
async fn test_second_trigger_rejected_while_running() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    upstream.pause();

    let first = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let second = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual);

    match second {
        Err(VosError::SyncAlreadyRunning { instance, job_type }) => {
            assert_eq!(instance, MAIN);
            assert_eq!(job_type, JobType::Customers);
        },
        other => panic!("Expected SyncAlreadyRunning, got {:?}", other),
    }
    assert!(h.engine.is_syncing());

    // Other pairs are unaffected
    h.upstream(BACKUP)
        .respond(paths::GET_ALL_CUSTOMERS, roster(&["2001"]));
    assert!(
        h.engine
            .trigger(BACKUP, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
            .is_ok()
    );

    upstream.resume();
    let job = h.engine.wait(first.job_id.unwrap()).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    h.engine.wait_all().await;

    // Once finished, the pair can run again
    let again = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    assert!(again.accepted);
    h.engine.wait_all().await;
    assert_eq!(h.engine.running_count(), 0);
}

#[tokio::test]
async fn test_progress_visible_while_running() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    upstream.pause();

    h.engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();

    let progress = h.engine.progress();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].instance, MAIN);
    assert_eq!(progress[0].instance_name, "main");
    assert_eq!(progress[0].status, JobStatus::Running);

    upstream.resume();
    h.engine.wait_all().await;
    assert!(h.engine.progress().is_empty());
}

#[tokio::test]
async fn test_cdr_failure_keeps_committed_records() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001", "1002", "1003"]));
    cdrs_by_account(&upstream, |account| match account {
        "1001" => Ok(cdrs("1001", 2)),
        _ => Err(UpstreamError::unavailable("connection reset")),
    });

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Cdrs, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.synced_count, 2);
    assert!(job.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(h.dataset.cdr_count(MAIN).unwrap(), 2);

    match job.failure() {
        Some(VosError::SyncPartialFailure { committed, .. }) => assert_eq!(committed, 2),
        other => panic!("Expected SyncPartialFailure, got {:?}", other),
    }

    // Failed jobs do not invalidate the cache
    assert!(h.invalidation.calls.lock().is_empty());
}

#[tokio::test]
async fn test_cdr_sync_skips_rejected_accounts() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001", "1002"]));
    cdrs_by_account(&upstream, |account| match account {
        "1001" => Err(UpstreamError::rejected(-10007, "account not found")),
        other => Ok(cdrs(other, 3)),
    });

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Cdrs, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.synced_count, 3);
    assert_eq!(job.processed, 2);
}

#[tokio::test]
async fn test_cdr_sync_fetches_roster_when_dataset_empty() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    cdrs_by_account(&upstream, |account| Ok(cdrs(account, 1)));

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Cdrs, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    h.engine.wait(receipt.job_id.unwrap()).await;

    assert_eq!(upstream.call_count(paths::GET_ALL_CUSTOMERS), 1);
    assert_eq!(h.dataset.customers(MAIN).unwrap().len(), 1);
}

#[tokio::test]
async fn test_cdr_sync_is_idempotent() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    cdrs_by_account(&upstream, |account| Ok(cdrs(account, 4)));
    let options = JobOptions {
        customer: Some("1001".to_string()),
        days: Some(3),
        ..JobOptions::default()
    };

    for expected in [4, 0] {
        let receipt = h
            .engine
            .trigger(MAIN, JobType::Cdrs, options.clone(), TriggerOrigin::Manual)
            .unwrap();
        let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();
        assert_eq!(job.synced_count, expected);
    }

    assert_eq!(h.dataset.cdr_count(MAIN).unwrap(), 4);
    assert_eq!(upstream.call_count(paths::GET_ALL_CUSTOMERS), 0);

    let request = &upstream.calls()[0];
    assert_eq!(request.params()["beginTime"], json!("20260307"));
    assert_eq!(request.params()["endTime"], json!("20260310"));

    let stored = h
        .dataset
        .cdrs(
            MAIN,
            &CdrQuery {
                account: Some("1001".to_string()),
                ..CdrQuery::default()
            },
        )
        .unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn test_gateway_sync_tolerates_missing_online_status() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(
        paths::GET_GATEWAY_MAPPING,
        json!({"retCode": 0, "infoGatewayMappings": [{"name": "gw-a"}, {"name": "gw-b"}]}),
    );
    upstream.respond(
        paths::GET_GATEWAY_MAPPING_ONLINE,
        json!({"retCode": 0, "infoGatewayMappingsOnline": [{"name": "gw-a", "isOnline": true}]}),
    );
    upstream.respond(
        paths::GET_GATEWAY_ROUTING,
        json!({"retCode": 0, "infoGatewayRoutings": [{"name": "rt-1"}]}),
    );
    upstream.fail(paths::GET_GATEWAY_ROUTING_ONLINE, UpstreamError::unavailable("timeout"));

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Gateways, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.synced_count, 3);

    let mappings = h.dataset.gateways(MAIN, Some(GatewayKind::Mapping)).unwrap();
    let gw_a = mappings.iter().find(|g| g.name == "gw-a").unwrap();
    assert!(gw_a.online);
    let routings = h.dataset.gateways(MAIN, Some(GatewayKind::Routing)).unwrap();
    assert_eq!(routings.len(), 1);
    assert!(!routings[0].online);
}

#[tokio::test]
async fn test_disabled_instance_rejected() {
    let h = harness();
    let result = h
        .engine
        .trigger(RETIRED, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual);

    assert!(matches!(result, Err(VosError::InstanceDisabled(id)) if id == RETIRED));
    assert_eq!(h.engine.running_count(), 0);
}

#[tokio::test]
async fn test_trigger_all_covers_enabled_instances() {
    let h = harness();
    h.upstream(MAIN).respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    h.upstream(BACKUP).respond(paths::GET_ALL_CUSTOMERS, roster(&["2001", "2002"]));
    h.upstream(MAIN).pause();

    // MAIN is already running, so only BACKUP is accepted
    h.engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let receipts =
        h.engine
            .trigger_all(JobType::Customers, JobOptions::default(), TriggerOrigin::Scheduled);

    assert_eq!(receipts.len(), 2);
    let main = receipts.iter().find(|r| r.instance == MAIN).unwrap();
    assert!(!main.accepted);
    assert!(main.reason.is_some());
    let backup = receipts.iter().find(|r| r.instance == BACKUP).unwrap();
    assert!(backup.accepted);
    assert!(receipts.iter().all(|r| r.instance != RETIRED));

    h.upstream(MAIN).resume();
    h.engine.wait_all().await;
    assert_eq!(h.dataset.customers(BACKUP).unwrap().len(), 2);
}

#[tokio::test]
async fn test_statuses_report_idle_pairs() {
    let h = harness();
    h.upstream(MAIN).respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    h.engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    h.engine.wait_all().await;

    let statuses = h.engine.statuses().unwrap();
    // 3 instances x 3 job types
    assert_eq!(statuses.len(), 9);

    let done = statuses
        .iter()
        .find(|s| s.instance == MAIN && s.job_type == JobType::Customers)
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let idle = statuses
        .iter()
        .find(|s| s.instance == BACKUP && s.job_type == JobType::Gateways)
        .unwrap();
    assert_eq!(idle.status, JobStatus::Idle);
    assert!(idle.job_id.is_none());
}

#[tokio::test]
async fn test_status_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.db");

    {
        let h = harness_with(Arc::new(SqliteDataset::open(&path).unwrap()));
        h.upstream(MAIN).respond(paths::GET_ALL_CUSTOMERS, roster(&["1001", "1002"]));
        h.engine
            .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
            .unwrap();
        h.engine.wait_all().await;
    }

    let h = harness_with(Arc::new(SqliteDataset::open(&path).unwrap()));
    let status = h.engine.status(MAIN, JobType::Customers).unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.synced_count, 2);
    assert_eq!(h.dataset.customers(MAIN).unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_admit_exactly_one() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    upstream.pause();

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let engine = h.engine.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                engine.trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
            })
        })
        .collect();

    let mut results = Vec::new();
    for attempt in attempts {
        results.push(attempt.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(VosError::SyncAlreadyRunning { .. }))));
    assert_eq!(h.engine.running_count(), 1);

    upstream.resume();
    h.engine.wait_all().await;
    assert_eq!(h.engine.running_count(), 0);
}

#[tokio::test]
async fn test_panicking_job_fails_and_frees_pair() {
    let h = harness();
    let upstream = h.upstream(MAIN);
    upstream.respond_with(paths::GET_ALL_CUSTOMERS, |_| panic!("roster decoder blew up"));

    let receipt = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let job = h.engine.wait(receipt.job_id.unwrap()).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("roster decoder blew up"));
    assert!(!h.engine.is_syncing());

    // El estado fallido tambien queda persistido
    let persisted = h
        .dataset
        .job_statuses()
        .unwrap()
        .into_iter()
        .find(|j| j.id == job.id)
        .unwrap();
    assert_eq!(persisted.status, JobStatus::Failed);

    // El par vuelve a aceptar triggers
    upstream.respond(paths::GET_ALL_CUSTOMERS, roster(&["1001"]));
    let again = h
        .engine
        .trigger(MAIN, JobType::Customers, JobOptions::default(), TriggerOrigin::Manual)
        .unwrap();
    let job = h.engine.wait(again.job_id.unwrap()).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
