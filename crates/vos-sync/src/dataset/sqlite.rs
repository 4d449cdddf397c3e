//! SQLite-backed dataset.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;
use vos_core::{GatewayKind, InstanceId, JobStatus, Result, SyncJob, VosError};

use super::{CdrQuery, CdrRecord, CustomerRecord, Dataset, GatewayRecord};

/// Schema for dataset tables.
const DATASET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    instance_id INTEGER NOT NULL,
    account TEXT NOT NULL,
    money REAL NOT NULL,
    limit_money REAL NOT NULL,
    in_debt INTEGER NOT NULL,
    raw TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    PRIMARY KEY (instance_id, account)
);

CREATE TABLE IF NOT EXISTS cdrs (
    instance_id INTEGER NOT NULL,
    hash TEXT NOT NULL,
    account TEXT,
    caller TEXT NOT NULL,
    callee TEXT NOT NULL,
    caller_gateway TEXT,
    callee_gateway TEXT,
    start_time TEXT,
    end_time TEXT,
    duration INTEGER NOT NULL,
    fee REAL NOT NULL,
    release_cause TEXT,
    raw TEXT NOT NULL,
    PRIMARY KEY (instance_id, hash)
);

CREATE INDEX IF NOT EXISTS idx_cdrs_start ON cdrs(instance_id, start_time);
CREATE INDEX IF NOT EXISTS idx_cdrs_account ON cdrs(instance_id, account);

CREATE TABLE IF NOT EXISTS gateways (
    instance_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    online INTEGER NOT NULL,
    address TEXT,
    raw TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    PRIMARY KEY (instance_id, kind, name)
);

-- One current-status row per (instance, job type)
CREATE TABLE IF NOT EXISTS sync_status (
    instance_id INTEGER NOT NULL,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    job TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (instance_id, job_type)
);
"#;

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn parse_raw(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

fn parse_kind(text: &str) -> GatewayKind {
    match text {
        "routing" => GatewayKind::Routing,
        "both" => GatewayKind::Both,
        _ => GatewayKind::Mapping,
    }
}

/// Dataset stored in a SQLite database.
pub struct SqliteDataset {
    conn: Mutex<Connection>,
}

impl SqliteDataset {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(VosError::storage)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            VosError::Storage(format!("failed to open dataset at {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(VosError::storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(DATASET_SCHEMA)
            .map_err(|e| VosError::Storage(format!("failed to run dataset migrations: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Dataset for SqliteDataset {
    fn upsert_customers(&self, instance: InstanceId, records: &[CustomerRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(VosError::storage)?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO customers
                     (instance_id, account, money, limit_money, in_debt, raw, synced_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(VosError::storage)?;
            for record in records {
                written += stmt
                    .execute(params![
                        instance.get(),
                        record.account,
                        record.money,
                        record.limit_money,
                        record.in_debt,
                        record.raw.to_string(),
                        timestamp(record.synced_at),
                    ])
                    .map_err(VosError::storage)?;
            }
        }
        tx.commit().map_err(VosError::storage)?;
        debug!(instance = %instance, count = written, "Customers upserted");
        Ok(written)
    }

    fn customers(&self, instance: InstanceId) -> Result<Vec<CustomerRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT account, money, limit_money, in_debt, raw, synced_at
                 FROM customers WHERE instance_id = ?1 ORDER BY account",
            )
            .map_err(VosError::storage)?;
        let rows = stmt
            .query_map(params![instance.get()], |row| {
                Ok(CustomerRecord {
                    account: row.get(0)?,
                    money: row.get(1)?,
                    limit_money: row.get(2)?,
                    in_debt: row.get(3)?,
                    raw: parse_raw(&row.get::<_, String>(4)?),
                    synced_at: parse_timestamp(&row.get::<_, String>(5)?),
                })
            })
            .map_err(VosError::storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VosError::storage)
    }

    fn insert_cdrs(&self, instance: InstanceId, records: &[CdrRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(VosError::storage)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO cdrs
                     (instance_id, hash, account, caller, callee, caller_gateway, callee_gateway,
                      start_time, end_time, duration, fee, release_cause, raw)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(VosError::storage)?;
            for record in records {
                inserted += stmt
                    .execute(params![
                        instance.get(),
                        record.hash,
                        record.account,
                        record.caller,
                        record.callee,
                        record.caller_gateway,
                        record.callee_gateway,
                        record.start_time,
                        record.end_time,
                        record.duration,
                        record.fee,
                        record.release_cause,
                        record.raw.to_string(),
                    ])
                    .map_err(VosError::storage)?;
            }
        }
        tx.commit().map_err(VosError::storage)?;
        Ok(inserted)
    }

    fn cdrs(&self, instance: InstanceId, query: &CdrQuery) -> Result<Vec<CdrRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT hash, account, caller, callee, caller_gateway, callee_gateway,
                        start_time, end_time, duration, fee, release_cause, raw
                 FROM cdrs
                 WHERE instance_id = ?1 AND (?2 IS NULL OR account = ?2)
                 ORDER BY start_time DESC, hash
                 LIMIT ?3",
            )
            .map_err(VosError::storage)?;
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![instance.get(), query.account, limit], |row| {
                Ok(CdrRecord {
                    hash: row.get(0)?,
                    account: row.get(1)?,
                    caller: row.get(2)?,
                    callee: row.get(3)?,
                    caller_gateway: row.get(4)?,
                    callee_gateway: row.get(5)?,
                    start_time: row.get(6)?,
                    end_time: row.get(7)?,
                    duration: row.get(8)?,
                    fee: row.get(9)?,
                    release_cause: row.get(10)?,
                    raw: parse_raw(&row.get::<_, String>(11)?),
                })
            })
            .map_err(VosError::storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VosError::storage)
    }

    fn cdr_count(&self, instance: InstanceId) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM cdrs WHERE instance_id = ?1",
                params![instance.get()],
                |row| row.get(0),
            )
            .map_err(VosError::storage)?;
        Ok(count.max(0) as u64)
    }

    fn upsert_gateways(&self, instance: InstanceId, records: &[GatewayRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(VosError::storage)?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO gateways
                     (instance_id, kind, name, online, address, raw, synced_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(VosError::storage)?;
            for record in records {
                written += stmt
                    .execute(params![
                        instance.get(),
                        record.kind.as_str(),
                        record.name,
                        record.online,
                        record.address,
                        record.raw.to_string(),
                        timestamp(record.synced_at),
                    ])
                    .map_err(VosError::storage)?;
            }
        }
        tx.commit().map_err(VosError::storage)?;
        Ok(written)
    }

    fn gateways(&self, instance: InstanceId, kind: Option<GatewayKind>) -> Result<Vec<GatewayRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT kind, name, online, address, raw, synced_at
                 FROM gateways
                 WHERE instance_id = ?1 AND (?2 IS NULL OR kind = ?2)
                 ORDER BY kind, name",
            )
            .map_err(VosError::storage)?;
        let kind = kind.map(GatewayKind::as_str);
        let rows = stmt
            .query_map(params![instance.get(), kind], |row| {
                Ok(GatewayRecord {
                    kind: parse_kind(&row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    online: row.get(2)?,
                    address: row.get(3)?,
                    raw: parse_raw(&row.get::<_, String>(4)?),
                    synced_at: parse_timestamp(&row.get::<_, String>(5)?),
                })
            })
            .map_err(VosError::storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VosError::storage)
    }

    fn save_job(&self, job: &SyncJob) -> Result<()> {
        let body = serde_json::to_string(job).map_err(VosError::storage)?;
        let updated_at = timestamp(job.finished_at.unwrap_or(job.started_at));
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sync_status (instance_id, job_type, status, job, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.instance.get(),
                job.job_type.as_str(),
                job.status.as_str(),
                body,
                updated_at,
            ],
        )
        .map_err(VosError::storage)?;
        Ok(())
    }

    fn job_statuses(&self) -> Result<Vec<SyncJob>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT job FROM sync_status ORDER BY instance_id, job_type")
            .map_err(VosError::storage)?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(VosError::storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VosError::storage)?;

        bodies
            .iter()
            .map(|body| serde_json::from_str::<SyncJob>(body).map_err(VosError::storage))
            .collect()
    }
}

impl SqliteDataset {
    /// Status row of one pair, if it ever ran.
    pub fn job_status(&self, instance: InstanceId, job_type: vos_core::JobType) -> Result<Option<SyncJob>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT job FROM sync_status WHERE instance_id = ?1 AND job_type = ?2",
                params![instance.get(), job_type.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(VosError::storage)?;
        body.map(|b| serde_json::from_str(&b).map_err(VosError::storage))
            .transpose()
    }

    /// Marks rows left `running` by a previous process as failed.
    ///
    /// A restart interrupts any job that was running; its committed records
    /// stay, but the status row must not claim it is still running.
    pub fn fail_interrupted_jobs(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut interrupted = Vec::new();
        for mut job in self.job_statuses()? {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Failed;
                job.finished_at = Some(now);
                job.error = Some("interrupted by restart".to_string());
                interrupted.push(job);
            }
        }
        for job in &interrupted {
            self.save_job(job)?;
        }
        Ok(interrupted.len())
    }
}
