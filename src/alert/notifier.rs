//! Notification sinks for alerts and notable statuses.

use async_trait::async_trait;
use thiserror::Error;

use super::{Alert, Severity};
use crate::db::Status;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Destination for alerts. Implementations other than logging (webhook,
/// email) plug in here without touching the checker or the scheduler.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Emit a derived alert.
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Emit a raw status with a caller-chosen severity and reason.
    async fn notify_status(
        &self,
        status: &Status,
        severity: Severity,
        reason: &str,
    ) -> Result<(), NotifyError>;
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let severity = alert.severity().unwrap_or(Severity::Info.as_str());
        let description = alert.annotations.get("description").unwrap_or_default();

        if alert.is_resolved() {
            tracing::info!("[ALERT][{}] {} {}", severity, alert, description);
        } else {
            tracing::warn!("[ALERT][{}] {} {}", severity, alert, description);
        }
        Ok(())
    }

    async fn notify_status(
        &self,
        status: &Status,
        severity: Severity,
        reason: &str,
    ) -> Result<(), NotifyError> {
        if status.available {
            tracing::info!(
                "[ALERT][{}] {} - {} ms (url={}, code={})",
                severity,
                reason,
                status.latency.as_millis(),
                status.url,
                status.code
            );
        } else {
            tracing::warn!(
                "[ALERT][{}] {} - error=\"{}\" (url={})",
                severity,
                reason,
                status.error_message,
                status.url
            );
        }
        Ok(())
    }
}
