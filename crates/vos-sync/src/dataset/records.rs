//! Durable record types built from upstream payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use vos_core::GatewayKind;

/// First non-empty string-ish member among `names`.
fn text(raw: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match raw.get(*name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First numeric member among `names`, accepting numeric strings.
fn number(raw: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| match raw.get(*name) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn flag(raw: &Value, names: &[&str]) -> bool {
    names.iter().any(|name| match raw.get(*name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        _ => false,
    })
}

/// A customer account of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub account: String,
    pub money: f64,
    pub limit_money: f64,
    pub in_debt: bool,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl CustomerRecord {
    /// Builds a record from an `infoCustomerBriefs` element. Elements without
    /// an account are skipped.
    pub fn from_upstream(raw: &Value, synced_at: DateTime<Utc>) -> Option<Self> {
        let account = text(raw, &["account", "Account"])?;
        let money = number(raw, &["money", "Money"]).unwrap_or(0.0);
        let limit_money = number(raw, &["limitMoney", "LimitMoney"]).unwrap_or(0.0);
        Some(Self {
            account,
            money,
            limit_money,
            in_debt: money < 0.0,
            raw: raw.clone(),
            synced_at,
        })
    }
}

/// One call detail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrRecord {
    /// Deduplication hash (16 hex chars).
    pub hash: String,
    pub account: Option<String>,
    pub caller: String,
    pub callee: String,
    pub caller_gateway: Option<String>,
    pub callee_gateway: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration: i64,
    pub fee: f64,
    pub release_cause: Option<String>,
    pub raw: Value,
}

impl CdrRecord {
    /// Builds a record from a `GetCdr` list element.
    pub fn from_upstream(raw: &Value, account: Option<&str>) -> Self {
        let caller = text(raw, &["callerE164", "caller", "src", "from"]).unwrap_or_default();
        let callee = text(raw, &["calleeE164", "callee", "dst", "to"]).unwrap_or_default();
        let start_time = text(raw, &["startTime", "start_time", "StartTime"]);
        let duration = number(raw, &["duration", "billsec"]).unwrap_or(0.0) as i64;

        Self {
            hash: cdr_hash(&caller, &callee, start_time.as_deref().unwrap_or(""), duration),
            account: text(raw, &["account", "customerAccount"]).or_else(|| account.map(String::from)),
            caller,
            callee,
            caller_gateway: text(raw, &["callerGateway", "caller_gateway"]),
            callee_gateway: text(raw, &["calleeGateway", "callee_gateway"]),
            start_time,
            end_time: text(raw, &["endTime", "end_time", "EndTime"]),
            duration,
            fee: number(raw, &["fee", "cost"]).unwrap_or(0.0),
            release_cause: text(raw, &["releaseCause", "disposition", "status"]),
            raw: raw.clone(),
        }
    }
}

/// `sha256(caller|callee|start|duration)`, first 16 hex chars.
pub fn cdr_hash(caller: &str, callee: &str, start_time: &str, duration: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}|{}", caller, callee, start_time, duration).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// A gateway definition merged with its online status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub name: String,
    pub kind: GatewayKind,
    pub online: bool,
    pub address: Option<String>,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl GatewayRecord {
    /// Builds a record from a definition element and the matching online
    /// element, if any. Elements without a name are skipped.
    pub fn from_upstream(
        definition: &Value,
        online: Option<&Value>,
        kind: GatewayKind,
        synced_at: DateTime<Utc>,
    ) -> Option<Self> {
        let name = text(definition, &["name"])?;
        let is_online = online.is_some_and(|o| flag(o, &["isOnline", "online"]));

        let mut merged = definition.as_object().cloned().unwrap_or_else(Map::new);
        if let Some(Value::Object(extra)) = online {
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
        }

        Some(Self {
            address: text(definition, &["ipAddress", "ip", "remoteIps"]),
            name,
            kind,
            online: is_online,
            raw: Value::Object(merged),
            synced_at,
        })
    }
}
