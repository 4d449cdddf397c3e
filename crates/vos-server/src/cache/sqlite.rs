//! Durable cache store on SQLite.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;
use vos_core::{CacheKey, InstanceId};

use super::invalidation::{InvalidationResult, KeyPattern, PathMatch};
use super::store::{CacheEntry, CacheError, CacheStore};

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    instance_id INTEGER NOT NULL,
    resource_path TEXT NOT NULL,
    params TEXT NOT NULL,
    payload TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (instance_id, resource_path, params)
);

CREATE INDEX IF NOT EXISTS idx_cache_fetched ON cache_entries(fetched_at);
"#;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Cache store that survives restarts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(CacheError::storage)?;
        }
        let conn = Connection::open(path).map_err(CacheError::storage)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(CacheError::storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(CACHE_SCHEMA).map_err(CacheError::storage)?;
        debug!("Cache schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn decode(
        instance_id: u32,
        resource_path: String,
        params: String,
        payload: String,
        fetched_at: String,
    ) -> Result<CacheEntry, CacheError> {
        let key = CacheKey::from_parts(InstanceId::new(instance_id), resource_path, params);
        let payload: Value = serde_json::from_str(&payload).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(CacheEntry::new(key, payload, fetched_at))
    }
}

type Row = (u32, String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

#[async_trait]
impl CacheStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let row = {
            let conn = self.conn.lock();
            conn.prepare_cached(
                "SELECT instance_id, resource_path, params, payload, fetched_at
                 FROM cache_entries
                 WHERE instance_id = ?1 AND resource_path = ?2 AND params = ?3",
            )
            .and_then(|mut stmt| {
                stmt.query_row(
                    params![key.instance().get(), key.resource_path(), key.params()],
                    read_row,
                )
                .optional()
            })
            .map_err(CacheError::storage)?
        };

        row.map(|(i, r, p, body, at)| Self::decode(i, r, p, body, at))
            .transpose()
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let body = serde_json::to_string(entry.payload.as_ref()).map_err(CacheError::storage)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries
                 (instance_id, resource_path, params, payload, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.key.instance().get(),
                entry.key.resource_path(),
                entry.key.params(),
                body,
                timestamp(entry.fetched_at),
            ],
        )
        .map_err(CacheError::storage)?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM cache_entries
                 WHERE instance_id = ?1 AND resource_path = ?2 AND params = ?3",
                params![key.instance().get(), key.resource_path(), key.params()],
            )
            .map_err(CacheError::storage)?;
        Ok(removed > 0)
    }

    async fn invalidate(&self, pattern: &KeyPattern) -> Result<InvalidationResult, CacheError> {
        // NULL binds match every instance / every path.
        let instance = pattern.instance.map(InstanceId::get);
        let (exact, prefix) = match &pattern.path {
            PathMatch::Any => (None, None),
            PathMatch::Exact(path) => (Some(path.as_str()), None),
            PathMatch::Prefix(prefix) => (None, Some(prefix.as_str())),
        };

        let conn = self.conn.lock();
        let count = conn
            .execute(
                "DELETE FROM cache_entries
                 WHERE (?1 IS NULL OR instance_id = ?1)
                   AND (?2 IS NULL OR resource_path = ?2)
                   AND (?3 IS NULL OR substr(resource_path, 1, length(?3)) = ?3)",
                params![instance, exact, prefix],
            )
            .map_err(CacheError::storage)?;

        Ok(InvalidationResult {
            count,
            patterns: vec![pattern.to_string()],
        })
    }

    async fn entries(&self, instance: Option<InstanceId>) -> Result<Vec<CacheEntry>, CacheError> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare_cached(
                    "SELECT instance_id, resource_path, params, payload, fetched_at
                     FROM cache_entries
                     WHERE (?1 IS NULL OR instance_id = ?1)
                     ORDER BY instance_id, resource_path",
                )
                .map_err(CacheError::storage)?;
            stmt.query_map(params![instance.map(InstanceId::get)], read_row)
                .map_err(CacheError::storage)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CacheError::storage)?
        };

        rows.into_iter()
            .map(|(i, r, p, body, at)| Self::decode(i, r, p, body, at))
            .collect()
    }
}
