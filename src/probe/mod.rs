//! Probe module for endpoint health checks.
//!
//! A probe performs one bounded HTTP GET and turns the outcome, including
//! transport failures, into a [`Status`](crate::db::Status).

mod http;

pub use http::*;

use std::time::Duration;
use thiserror::Error;

/// Probe error types.
///
/// These never leave the probe as errors: they are rendered into the
/// status message of a failed check.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe cancelled")]
    Cancelled,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Prefix a scheme when the address does not carry one.
pub fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url(" example.com/path "), "http://example.com/path");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_error_messages() {
        let timeout = ProbeError::Timeout(Duration::from_secs(2)).to_string();
        assert!(timeout.contains("timed out"));
        assert!(ProbeError::Cancelled.to_string().contains("cancelled"));
    }
}
