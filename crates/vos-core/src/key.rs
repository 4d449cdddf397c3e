//! Cache keys and request-parameter normalization.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::instance::InstanceId;
use crate::paths;

/// Normalizes a parameter set so that equivalent requests compare equal.
///
/// - `null` becomes an empty object;
/// - object members whose value is `null` or an empty array are dropped
///   (an empty filter means "no filter");
/// - array elements are sorted by their canonical JSON text;
/// - nested objects are normalized recursively.
///
/// Object members come out sorted by name because `serde_json::Map` is
/// ordered.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use vos_core::normalize_params;
///
/// assert_eq!(normalize_params(&json!({"names": []})), json!({}));
/// assert_eq!(
///     normalize_params(&json!({"accounts": ["b", "a"]})),
///     json!({"accounts": ["a", "b"]})
/// );
/// ```
pub fn normalize_params(params: &Value) -> Value {
    match params {
        Value::Null => Value::Object(Map::new()),
        other => normalize_value(other),
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (name, member) in map {
                if is_empty_filter(member) {
                    continue;
                }
                out.insert(name.clone(), normalize_value(member));
            }
            Value::Object(out)
        },
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(normalize_value).collect();
            items.sort_by_cached_key(|item| item.to_string());
            Value::Array(items)
        },
        scalar => scalar.clone(),
    }
}

fn is_empty_filter(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Key of a cached upstream response.
///
/// Built from the instance, the normalized resource path and the normalized
/// parameter set. Two requests that differ only in member order, array order
/// or empty filters produce the same key.
///
/// The display form is `instance:path:params`, which is what pattern-based
/// invalidation matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    instance: InstanceId,
    resource_path: String,
    params: String,
}

impl CacheKey {
    /// Creates a key, normalizing both path and parameters.
    pub fn new(instance: InstanceId, resource_path: &str, params: &Value) -> Self {
        Self {
            instance,
            resource_path: paths::normalize(resource_path),
            params: normalize_params(params).to_string(),
        }
    }

    /// Rebuilds a key from its stored parts without re-normalizing.
    pub fn from_parts(instance: InstanceId, resource_path: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            instance,
            resource_path: resource_path.into(),
            params: params.into(),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Canonical JSON text of the normalized parameters.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// The normalized parameters as a JSON value.
    pub fn params_value(&self) -> Value {
        serde_json::from_str(&self.params).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Short stable digest of the key, suitable for logs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.instance, self.resource_path, self.params)
    }
}
