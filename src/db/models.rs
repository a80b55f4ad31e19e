//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol assumed when a monitor does not name one.
pub const DEFAULT_MONITOR_KIND: &str = "http";

/// A watched endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// Assigned by the store; 0 until persisted.
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            url: String::new(),
            kind: DEFAULT_MONITOR_KIND.to_string(),
        }
    }
}

impl Monitor {
    /// An unpersisted monitor for a one-off check.
    pub fn ad_hoc(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    /// 0 for ad hoc checks that belong to no monitor.
    pub monitor_id: i64,
    pub url: String,
    pub available: bool,
    /// HTTP status code, or 0 when no response was received.
    pub code: u16,
    /// Empty when the target was available.
    pub error_message: String,
    pub latency: Duration,
    pub checked_at: DateTime<Utc>,
}

impl Status {
    /// Whether `checked_at` was never filled in.
    pub fn is_unstamped(&self) -> bool {
        self.checked_at == DateTime::<Utc>::default()
    }
}
