//! Configuration module for uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::checker::{CheckerConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_SLOW_THRESHOLD_MS};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "uptrail.db")
    pub db_path: String,
    /// Probes allowed in flight at once (default: 5)
    pub max_concurrency: usize,
    /// Per-probe timeout in seconds (default: 10)
    pub probe_timeout_secs: u64,
    /// Latency reported as slow, in milliseconds (default: 800)
    pub slow_threshold_ms: u64,
    /// Seconds between check cycles (default: 60)
    pub check_interval_secs: u64,
    /// Public base URL used in alert links (default: "http://localhost:8080")
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "uptrail.db".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            probe_timeout_secs: 10,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            check_interval_secs: 60,
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`
    /// - `UPTRAIL_DB_PATH`
    /// - `UPTRAIL_MAX_CONCURRENCY`
    /// - `UPTRAIL_PROBE_TIMEOUT_SECS`
    /// - `UPTRAIL_SLOW_THRESHOLD_MS`
    /// - `UPTRAIL_CHECK_INTERVAL_SECS`
    /// - `UPTRAIL_BASE_URL`
    ///
    /// Values that fail to parse keep their default.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        set_parsed(&mut cfg.http_port, lookup("UPTRAIL_HTTP_PORT"));
        set_parsed(&mut cfg.max_concurrency, lookup("UPTRAIL_MAX_CONCURRENCY"));
        set_parsed(&mut cfg.probe_timeout_secs, lookup("UPTRAIL_PROBE_TIMEOUT_SECS"));
        set_parsed(&mut cfg.slow_threshold_ms, lookup("UPTRAIL_SLOW_THRESHOLD_MS"));
        set_parsed(&mut cfg.check_interval_secs, lookup("UPTRAIL_CHECK_INTERVAL_SECS"));

        if let Some(db_path) = lookup("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(base_url) = lookup("UPTRAIL_BASE_URL") {
            cfg.base_url = base_url;
        }

        cfg
    }

    pub fn checker(&self) -> CheckerConfig {
        CheckerConfig {
            max_concurrency: self.max_concurrency,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            slow_threshold_ms: self.slow_threshold_ms,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, raw: Option<String>) {
    if let Some(value) = raw.and_then(|s| s.trim().parse().ok()) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "uptrail.db");
        assert_eq!(cfg.checker().probe_timeout, Duration::from_secs(10));
        assert_eq!(cfg.check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("UPTRAIL_HTTP_PORT", "9090"),
            ("UPTRAIL_MAX_CONCURRENCY", "lots"),
            ("UPTRAIL_SLOW_THRESHOLD_MS", " 250 "),
            ("UPTRAIL_DB_PATH", "/tmp/checks.db"),
        ]
        .into_iter()
        .collect();

        let cfg = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.max_concurrency, 5);
        assert_eq!(cfg.slow_threshold_ms, 250);
        assert_eq!(cfg.db_path, "/tmp/checks.db");
        assert_eq!(cfg.base_url, "http://localhost:8080");
    }
}
