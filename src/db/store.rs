//! SQLite database store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use super::models::*;
use super::repository::Repository;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create a store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;

        for migration in report.applied_migrations() {
            tracing::debug!("Applied migration {}", migration);
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Monitors ---

    /// Get all monitors ordered by id.
    pub fn get_monitors(&self) -> Result<Vec<Monitor>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, url, type FROM monitors ORDER BY id ASC")?;

        let monitors = stmt
            .query_map([], monitor_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(monitors)
    }

    /// Insert a monitor or merge it into the one with the same URL.
    pub fn upsert_monitor(&self, monitor: &Monitor) -> Result<Monitor, DbError> {
        let url = monitor.url.trim();
        if url.is_empty() {
            return Err(DbError::Invalid("monitor URL is required".to_string()));
        }

        let conn = self.conn()?;
        let stored = conn.query_row(
            "INSERT INTO monitors (name, url, type) VALUES (?1, ?2, COALESCE(NULLIF(?3, ''), 'http'))
             ON CONFLICT(url) DO UPDATE SET
             name = COALESCE(NULLIF(?1, ''), monitors.name),
             type = COALESCE(NULLIF(?3, ''), monitors.type)
             RETURNING id, name, url, type",
            params![monitor.name, url, monitor.kind],
            monitor_from_row,
        )?;
        Ok(stored)
    }

    /// Delete a monitor and its statuses.
    pub fn delete_monitor_by_url(&self, url: &str) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM statuses WHERE monitor_id IN (SELECT id FROM monitors WHERE url = ?1)",
            params![url],
        )?;
        let deleted = conn.execute("DELETE FROM monitors WHERE url = ?1", params![url])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- Statuses ---

    /// Append a status row.
    pub fn add_status(&self, status: &Status) -> Result<(), DbError> {
        if status.url.is_empty() {
            return Err(DbError::Invalid("status URL is required".to_string()));
        }

        let checked_at = if status.is_unstamped() {
            Utc::now()
        } else {
            status.checked_at
        };
        let monitor_id = (status.monitor_id != 0).then_some(status.monitor_id);
        let error_message =
            (!status.error_message.is_empty()).then_some(status.error_message.as_str());
        let latency_ns = i64::try_from(status.latency.as_nanos()).unwrap_or(i64::MAX);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO statuses (monitor_id, url, available, code, error_message, latency_ns, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                monitor_id,
                status.url,
                status.available,
                status.code,
                error_message,
                latency_ns,
                checked_at.format(TIME_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// Get all statuses for a monitor, newest first.
    pub fn get_statuses(&self, monitor_id: i64) -> Result<Vec<Status>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT monitor_id, url, available, code, error_message, latency_ns, checked_at
             FROM statuses WHERE monitor_id = ?1 ORDER BY checked_at DESC, id DESC",
        )?;

        let statuses = stmt
            .query_map(params![monitor_id], status_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(statuses)
    }

    /// Remove every monitor and status and reset the id sequences.
    pub fn clear(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM statuses;
             DELETE FROM monitors;
             DELETE FROM sqlite_sequence WHERE name IN ('statuses', 'monitors');",
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl Repository for Store {
    async fn list_monitors(&self) -> Result<Vec<Monitor>, DbError> {
        self.get_monitors()
    }

    async fn add_monitor(&self, monitor: &Monitor) -> Result<Monitor, DbError> {
        self.upsert_monitor(monitor)
    }

    async fn delete_monitor(&self, url: &str) -> Result<(), DbError> {
        self.delete_monitor_by_url(url)
    }

    async fn record_status(&self, status: &Status) -> Result<(), DbError> {
        self.add_status(status)
    }

    async fn last_statuses(&self, monitor_id: i64) -> Result<Vec<Status>, DbError> {
        self.get_statuses(monitor_id)
    }

    async fn delete_all(&self) -> Result<(), DbError> {
        self.clear()
    }
}

fn monitor_from_row(row: &Row<'_>) -> SqlResult<Monitor> {
    Ok(Monitor {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        kind: row.get(3)?,
    })
}

fn status_from_row(row: &Row<'_>) -> SqlResult<Status> {
    let monitor_id: Option<i64> = row.get(0)?;
    let error_message: Option<String> = row.get(4)?;
    let latency_ns: i64 = row.get(5)?;
    let time_str: String = row.get(6)?;

    Ok(Status {
        monitor_id: monitor_id.unwrap_or(0),
        url: row.get(1)?,
        available: row.get(2)?,
        code: row.get(3)?,
        error_message: error_message.unwrap_or_default(),
        latency: Duration::from_nanos(latency_ns.max(0) as u64),
        checked_at: parse_db_time(&time_str).unwrap_or_else(Utc::now),
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIME_FORMAT) {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
