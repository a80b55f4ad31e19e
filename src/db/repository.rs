//! Persistence contract consumed by the checker and the scheduler.

use async_trait::async_trait;

use super::models::{Monitor, Status};
use super::store::DbError;

/// Storage backend for monitors and their status history.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All known monitors, ordered by id.
    async fn list_monitors(&self) -> Result<Vec<Monitor>, DbError>;

    /// Upsert by URL. Non-empty fields overwrite, empty fields keep the
    /// stored values. Returns the monitor as stored.
    async fn add_monitor(&self, monitor: &Monitor) -> Result<Monitor, DbError>;

    /// Remove a monitor and its history.
    async fn delete_monitor(&self, url: &str) -> Result<(), DbError>;

    /// Append a status. Fails when the URL is empty.
    async fn record_status(&self, status: &Status) -> Result<(), DbError>;

    /// Every status recorded for a monitor, most recent first.
    async fn last_statuses(&self, monitor_id: i64) -> Result<Vec<Status>, DbError>;

    /// Irreversibly clear all monitors and statuses.
    async fn delete_all(&self) -> Result<(), DbError>;
}
