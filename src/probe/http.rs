//! HTTP probe implementation.

use chrono::Utc;
use reqwest::{redirect, tls, Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{normalize_url, ProbeError};
use crate::db::Status;

/// Identifies probe traffic in target access logs.
pub const USER_AGENT: &str = concat!("uptrail/", env!("CARGO_PKG_VERSION"), " (+monitoring)");

/// Response bytes read before the rest of the body is dropped.
pub const BODY_READ_LIMIT: usize = 1 << 20;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const MAX_REDIRECTS: usize = 5;

/// Issues single GET probes through a shared, pooled client.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    /// Build a prober whose requests never outlive `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .min_tls_version(tls::Version::TLS_1_2)
            .redirect(redirect::Policy::custom(|attempt| {
                // Stopping hands back the last redirect response instead of an error.
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Run one probe against `address`.
    ///
    /// Never fails: transport errors, timeouts and cancellation come back as
    /// an unavailable status with code 0 and a descriptive message.
    pub async fn probe(&self, address: &str, cancel: &CancellationToken, deadline: Duration) -> Status {
        let url = normalize_url(address);
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            res = tokio::time::timeout(deadline, self.fetch(&url)) => {
                res.unwrap_or(Err(ProbeError::Timeout(deadline)))
            }
        };

        let mut status = Status {
            url,
            latency: start.elapsed(),
            checked_at: Utc::now(),
            ..Default::default()
        };

        match outcome {
            Ok(code) => {
                status.code = code;
                status.available = (200..400).contains(&code);
                if !status.available {
                    status.error_message = reason_phrase(code);
                }
            }
            Err(e) => {
                status.code = 0;
                status.error_message = e.to_string();
            }
        }

        tracing::debug!(
            "Probe {} -> code={} available={} in {:?}",
            status.url,
            status.code,
            status.available,
            status.latency
        );

        status
    }

    async fn fetch(&self, url: &str) -> Result<u16, ProbeError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let code = response.status().as_u16();

        // The status line already decided the outcome; a broken body does not change it.
        if let Err(e) = drain_body(&mut response, BODY_READ_LIMIT).await {
            tracing::debug!("Probe {}: body read aborted: {}", url, e);
        }

        Ok(code)
    }

    fn transport_error(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else {
            ProbeError::Network(error_chain(&err))
        }
    }
}

/// Read and discard at most `limit` bytes of the body.
async fn drain_body(response: &mut Response, limit: usize) -> Result<usize, reqwest::Error> {
    let mut read = 0;
    while read < limit {
        match response.chunk().await? {
            Some(chunk) => read += chunk.len(),
            None => break,
        }
    }
    Ok(read)
}

/// Render an error with all of its sources, e.g. "error sending request: ...: Connection refused".
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn reason_phrase(code: u16) -> String {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", code))
}
