//! Tests de POST /api/instances/{id}/query.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use helpers::*;
use serde_json::{Value, json};
use vos_core::{CacheKey, paths};
use vos_server::DisabledPolicy;
use vos_server::cache::{CacheEntry, CacheStore};
use vos_upstream::UpstreamError;

fn query(path: &str) -> Value {
    json!({"resource_path": path, "params": {}})
}

// === Freshness ===

#[tokio::test]
async fn first_query_goes_upstream_then_cache() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));

    let first: Value = app
        .client
        .post_json("/api/instances/1/query", query(paths::GET_GATEWAY_MAPPING_ONLINE))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_query_response(&first, "vos_api");
    assert_eq!(first["instance_name"], "main");
    assert_eq!(first["stale"], false);

    let second: Value = app
        .client
        .post_json("/api/instances/1/query", query(paths::GET_GATEWAY_MAPPING_ONLINE))
        .await
        .json();
    assert_query_response(&second, "database");
    assert_eq!(second["data"], first["data"]);
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_GATEWAY_MAPPING_ONLINE), 1);
}

#[tokio::test]
async fn real_time_entry_expires_after_thirty_seconds() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));
    let body = query(paths::GET_GATEWAY_MAPPING_ONLINE);

    app.client.post_json("/api/instances/1/query", body.clone()).await;

    app.clock.advance(Duration::from_secs(29));
    let json: Value = app.client.post_json("/api/instances/1/query", body.clone()).await.json();
    assert_eq!(json["data_source"], "database");

    app.clock.advance(Duration::from_secs(2));
    let json: Value = app.client.post_json("/api/instances/1/query", body).await.json();
    assert_eq!(json["data_source"], "vos_api");
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_GATEWAY_MAPPING_ONLINE), 2);
}

#[tokio::test]
async fn force_refresh_bypasses_fresh_entry() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_ALL_CUSTOMERS, roster(&["acme"]));

    app.client
        .post_json("/api/instances/1/query", query(paths::GET_ALL_CUSTOMERS))
        .await;
    let json: Value = app
        .client
        .post_json(
            "/api/instances/1/query",
            json!({"resource_path": paths::GET_ALL_CUSTOMERS, "force_refresh": true}),
        )
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_query_response(&json, "vos_api");
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_ALL_CUSTOMERS), 2);
}

#[tokio::test]
async fn empty_and_missing_list_params_share_an_entry() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_CUSTOMER, roster(&["acme"]));

    app.client
        .post_json(
            "/api/instances/1/query",
            json!({"resource_path": paths::GET_CUSTOMER, "params": {"accounts": []}}),
        )
        .await
        .assert_status(StatusCode::OK);
    let json: Value = app
        .client
        .post_json(
            "/api/instances/1/query",
            json!({"resource_path": paths::GET_CUSTOMER, "params": {}}),
        )
        .await
        .json();

    assert_eq!(json["data_source"], "database");
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_CUSTOMER), 1);
}

#[tokio::test]
async fn different_params_use_different_entries() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_CUSTOMER, roster(&["acme"]));

    for account in ["acme", "globex"] {
        let json: Value = app
            .client
            .post_json(
                "/api/instances/1/query",
                json!({"resource_path": paths::GET_CUSTOMER, "params": {"accounts": [account]}}),
            )
            .await
            .json();
        assert_eq!(json["data_source"], "vos_api");
    }
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_CUSTOMER), 2);
}

// === Stale fallback ===

#[tokio::test]
async fn expired_entry_is_served_stale_when_upstream_fails() {
    let app = app();
    let upstream = app.upstream(MAIN);
    upstream.respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));
    let body = query(paths::GET_GATEWAY_MAPPING_ONLINE);

    let fresh: Value = app.client.post_json("/api/instances/1/query", body.clone()).await.json();

    app.clock.advance(Duration::from_secs(60));
    upstream.fail(
        paths::GET_GATEWAY_MAPPING_ONLINE,
        UpstreamError::unavailable("connection refused"),
    );

    let json: Value = app
        .client
        .post_json("/api/instances/1/query", body)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(json["success"], true);
    assert_eq!(json["data_source"], "database");
    assert_eq!(json["stale"], true);
    assert!(json["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(json["data"], fresh["data"]);
}

#[tokio::test]
async fn upstream_failure_without_entry_is_an_error() {
    let app = app();
    app.upstream(MAIN).fail(
        paths::GET_PERFORMANCE,
        UpstreamError::unavailable("connection refused"),
    );

    let response = app
        .client
        .post_json("/api/instances/1/query", query(paths::GET_PERFORMANCE))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_error_body(&response.json());
}

#[tokio::test]
async fn upstream_rejection_without_entry_is_bad_gateway() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_CDR, json!({"retCode": -2, "exception": "bad date"}));

    let response = app
        .client
        .post_json("/api/instances/1/query", query(paths::GET_CDR))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let json: Value = response.json();
    assert_error_body(&json);
    assert!(json["message"].as_str().unwrap().contains("bad date"));
}

// === Errores de request ===

#[tokio::test]
async fn unknown_instance_returns_404() {
    let app = app();

    let response = app
        .client
        .post_json("/api/instances/99/query", query(paths::GET_PERFORMANCE))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_error_body(&response.json());
}

#[tokio::test]
async fn disabled_instance_returns_403() {
    let app = app();

    let response = app
        .client
        .post_json("/api/instances/3/query", query(paths::GET_PERFORMANCE))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_error_body(&response.json());
    assert!(app.upstream(RETIRED).calls().is_empty());
}

#[tokio::test]
async fn disabled_instance_with_cache_only_policy_serves_cached_entry() {
    let app = app_with(DisabledPolicy::CacheOnly);
    let key = CacheKey::new(RETIRED, paths::GET_PERFORMANCE, &json!({}));
    app.store
        .put(CacheEntry::new(key, json!({"retCode": 0, "cpu": 12}), start_time()))
        .await
        .unwrap();

    let json: Value = app
        .client
        .post_json("/api/instances/3/query", query(paths::GET_PERFORMANCE))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_query_response(&json, "database");
    assert_eq!(json["data"]["cpu"], 12);
    assert!(app.upstream(RETIRED).calls().is_empty());
}

#[tokio::test]
async fn disabled_instance_with_cache_only_policy_and_no_entry_returns_403() {
    let app = app_with(DisabledPolicy::CacheOnly);

    app.client
        .post_json("/api/instances/3/query", query(paths::GET_PERFORMANCE))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_resource_path_returns_400() {
    let app = app();

    let response = app
        .client
        .post_json("/api/instances/1/query", json!({"resource_path": "  "}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_error_body(&response.json());
}

#[tokio::test]
async fn non_object_params_return_400() {
    let app = app();

    app.client
        .post_json(
            "/api/instances/1/query",
            json!({"resource_path": paths::GET_PERFORMANCE, "params": [1, 2]}),
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
