//! Custom assertions para tests.

use serde_json::Value;

/// Verifica el cuerpo de una respuesta de error.
pub fn assert_error_body(json: &Value) {
    assert_eq!(json["success"], false, "Error body should have success=false: {}", json);
    assert!(json["error"].is_string(), "Missing 'error' field: {}", json);
    assert!(
        json["message"].as_str().is_some_and(|m| !m.is_empty()),
        "Missing 'message' field: {}",
        json
    );
}

/// Verifica el schema de una respuesta de query de una instancia.
pub fn assert_query_response(json: &Value, data_source: &str) {
    assert_eq!(json["success"], true, "Query should succeed: {}", json);
    assert_eq!(json["data_source"], data_source, "Unexpected data_source: {}", json);
    assert!(json["instance_name"].is_string(), "Missing 'instance_name': {}", json);
    assert!(json["stale"].is_boolean(), "Missing 'stale': {}", json);
    assert!(json.get("data").is_some(), "Missing 'data': {}", json);
}

/// Busca la fila de una instancia en `per_instance`.
pub fn instance_row(json: &Value, instance_id: u32) -> Value {
    json["per_instance"]
        .as_array()
        .expect("per_instance should be an array")
        .iter()
        .find(|row| row["instance_id"] == instance_id)
        .cloned()
        .unwrap_or_else(|| panic!("No per_instance row for {}: {}", instance_id, json))
}
