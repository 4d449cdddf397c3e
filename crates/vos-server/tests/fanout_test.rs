//! Tests de POST /api/query.

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::{Value, json};
use vos_core::paths;
use vos_upstream::UpstreamError;

fn body() -> Value {
    json!({"resource_path": paths::GET_GATEWAY_MAPPING_ONLINE})
}

#[tokio::test]
async fn merges_records_from_every_enabled_instance() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a", "gw-b"]));
    app.upstream(BACKUP)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-c"]));

    let json: Value = app
        .client
        .post_json("/api/query", body())
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(json["success"], true);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["name"], "gw-a");
    assert_eq!(results[0]["_instance_id"], 1);
    assert_eq!(results[2]["name"], "gw-c");
    assert_eq!(results[2]["_instance_id"], 2);

    let main = instance_row(&json, 1);
    assert_eq!(main["success"], true);
    assert_eq!(main["count"], 2);
    assert_eq!(main["data_source"], "vos_api");
    assert_eq!(instance_row(&json, 2)["count"], 1);
}

#[tokio::test]
async fn disabled_instances_are_not_queried() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));
    app.upstream(BACKUP)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-c"]));

    let json: Value = app.client.post_json("/api/query", body()).await.json();

    let rows = json["per_instance"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row["instance_id"] != 3));
    assert!(app.upstream(RETIRED).calls().is_empty());
}

#[tokio::test]
async fn one_failing_instance_does_not_fail_the_query() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));
    app.upstream(BACKUP).fail(
        paths::GET_GATEWAY_MAPPING_ONLINE,
        UpstreamError::unavailable("connection refused"),
    );

    let json: Value = app
        .client
        .post_json("/api/query", body())
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(json["success"], true);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);

    let backup = instance_row(&json, 2);
    assert_eq!(backup["success"], false);
    assert_eq!(backup["count"], 0);
    assert!(backup["error"].as_str().unwrap().contains("connection refused"));
    assert!(backup.get("data_source").is_none());
}

#[tokio::test]
async fn every_instance_failing_reports_failure() {
    let app = app();

    // Sin fixtures: ambas instancias rechazan la llamada.
    let json: Value = app
        .client
        .post_json("/api/query", body())
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(json["success"], false);
    assert!(json["results"].as_array().unwrap().is_empty());
    assert_eq!(instance_row(&json, 1)["success"], false);
    assert_eq!(instance_row(&json, 2)["success"], false);
}

#[tokio::test]
async fn second_fanout_is_served_from_cache() {
    let app = app();
    app.upstream(MAIN)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-a"]));
    app.upstream(BACKUP)
        .respond(paths::GET_GATEWAY_MAPPING_ONLINE, online_gateways(&["gw-c"]));

    app.client.post_json("/api/query", body()).await;
    let json: Value = app.client.post_json("/api/query", body()).await.json();

    assert_eq!(instance_row(&json, 1)["data_source"], "database");
    assert_eq!(instance_row(&json, 2)["data_source"], "database");
    assert_eq!(app.upstream(MAIN).call_count(paths::GET_GATEWAY_MAPPING_ONLINE), 1);
}

#[tokio::test]
async fn empty_resource_path_returns_400() {
    let app = app();

    let response = app
        .client
        .post_json("/api/query", json!({"resource_path": ""}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_error_body(&response.json());
}
