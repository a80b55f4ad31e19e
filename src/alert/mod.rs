//! Alert derivation from failed probes.

mod labels;
mod notifier;

pub use labels::*;
pub use notifier::*;

use crate::db::Status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of the `alertname` label on every derived alert.
pub const ALERT_NAME: &str = "ServiceUnavailable";

/// How bad an unavailable status is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Classify an HTTP code; 0 is a network failure.
    pub fn from_code(code: u16) -> Self {
        match code {
            500.. => Severity::Critical,
            400.. => Severity::Warning,
            0 => Severity::Critical,
            // Unreachable while availability means 2xx/3xx; kept for other policies.
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient unavailability event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identity of the alert; always carries `alertname` and `service`.
    pub labels: Labels,
    pub annotations: Labels,
    pub starts_at: DateTime<Utc>,
    /// Unset while the alert is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
}

impl Alert {
    pub fn name(&self) -> &str {
        self.labels.get("alertname").unwrap_or_default()
    }

    pub fn fingerprint(&self) -> u64 {
        self.labels.fingerprint()
    }

    pub fn severity(&self) -> Option<&str> {
        self.labels.get("severity")
    }

    pub fn is_resolved(&self) -> bool {
        self.is_resolved_at(Utc::now())
    }

    /// Resolved once the end time is set and not after `at`.
    pub fn is_resolved_at(&self, at: DateTime<Utc>) -> bool {
        matches!(self.ends_at, Some(end) if end <= at)
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = format!("{:016x}", self.fingerprint());
        let state = if self.is_resolved() { "resolved" } else { "active" };
        write!(f, "{}[{}][{}]", self.name(), &hash[..7], state)
    }
}

/// Turns statuses into alerts.
#[derive(Debug, Clone)]
pub struct Evaluator {
    base_url: String,
}

impl Evaluator {
    /// `base_url` prefixes the generator link of every alert.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Derive an alert, or `None` when the status is available.
    pub fn evaluate(&self, status: &Status) -> Option<Alert> {
        if status.available {
            return None;
        }

        let severity = Severity::from_code(status.code);

        let mut labels = Labels::new();
        labels.set("alertname", ALERT_NAME);
        labels.set("service", status.url.as_str());
        labels.set("severity", severity.as_str());
        labels.set("code", status.code.to_string());

        let mut annotations = Labels::new();
        annotations.set("description", describe(status));
        annotations.set("summary", format!("Service {} is down", status.url));

        Some(Alert {
            labels,
            annotations,
            starts_at: status.checked_at,
            ends_at: None,
            generator_url: format!("{}/monitors/{}", self.base_url, status.url),
        })
    }
}

fn describe(status: &Status) -> String {
    if status.error_message.is_empty() {
        format!(
            "Service {} returned code {} (latency {:?})",
            status.url, status.code, status.latency
        )
    } else {
        format!(
            "Service {} failed: {} (code {}, latency {:?})",
            status.url, status.error_message, status.code, status.latency
        )
    }
}
