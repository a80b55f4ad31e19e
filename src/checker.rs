//! Checker service.
//!
//! Wraps the HTTP probe with a process-wide concurrency gate and records
//! every outcome through the repository before handing it back.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::alert::{Evaluator, Notifier, Severity};
use crate::db::{DbError, Monitor, Repository, Status, DEFAULT_MONITOR_KIND};
use crate::probe::{normalize_url, HttpProber, ProbeError};

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 800;

/// Checker error types.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("concurrency gate closed")]
    GateClosed,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Checker tuning. Zero values fall back to the defaults.
#[derive(Debug, Clone, Copy)]
pub struct CheckerConfig {
    pub max_concurrency: usize,
    pub probe_timeout: Duration,
    /// Latency above which an available probe is reported as slow.
    pub slow_threshold_ms: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
        }
    }
}

impl CheckerConfig {
    fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            max_concurrency: if self.max_concurrency == 0 {
                defaults.max_concurrency
            } else {
                self.max_concurrency
            },
            probe_timeout: if self.probe_timeout.is_zero() {
                defaults.probe_timeout
            } else {
                self.probe_timeout
            },
            slow_threshold_ms: if self.slow_threshold_ms == 0 {
                defaults.slow_threshold_ms
            } else {
                self.slow_threshold_ms
            },
        }
    }
}

/// Bounded-concurrency probe executor with unconditional persistence.
pub struct CheckerService {
    repo: Arc<dyn Repository>,
    prober: HttpProber,
    gate: Arc<Semaphore>,
    evaluator: Evaluator,
    notifier: Option<Arc<dyn Notifier>>,
    config: CheckerConfig,
}

impl CheckerService {
    pub fn new(
        repo: Arc<dyn Repository>,
        config: CheckerConfig,
        evaluator: Evaluator,
    ) -> Result<Self, CheckError> {
        let config = config.normalized();
        let prober = HttpProber::new(config.probe_timeout)?;

        Ok(Self {
            repo,
            prober,
            gate: Arc::new(Semaphore::new(config.max_concurrency)),
            evaluator,
            notifier: None,
            config,
        })
    }

    /// Send alerts and slow-response reports to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Probe a monitor and record the outcome.
    ///
    /// Waits for a free slot when the gate is full. `timeout` defaults to
    /// the configured probe timeout. Failing to record the status is logged
    /// and otherwise ignored; the caller always gets the probe result.
    pub async fn verify_monitor(
        &self,
        monitor: &Monitor,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<Status, CheckError> {
        let _permit = self.gate.acquire().await.map_err(|_| CheckError::GateClosed)?;

        let deadline = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.config.probe_timeout);

        let mut status = self.prober.probe(&monitor.url, cancel, deadline).await;
        status.monitor_id = monitor.id;

        if let Err(e) = self.repo.record_status(&status).await {
            tracing::warn!("Failed to record status for {}: {}", status.url, e);
        }

        self.report(&status).await;

        Ok(status)
    }

    /// Probe a URL that belongs to no monitor.
    pub async fn verify_url(&self, url: &str, cancel: &CancellationToken) -> Result<Status, CheckError> {
        self.verify_monitor(&Monitor::ad_hoc(url), cancel, None).await
    }

    /// Make sure a monitor exists for `url` and return it with its id.
    pub async fn track_url(&self, url: &str) -> Result<Monitor, CheckError> {
        let url = normalize_url(url);
        let monitor = Monitor {
            id: 0,
            name: url.clone(),
            url,
            kind: DEFAULT_MONITOR_KIND.to_string(),
        };
        Ok(self.repo.add_monitor(&monitor).await?)
    }

    /// Recorded statuses for a monitor, newest first, cut to the newest `n`
    /// when `n` is non-zero.
    pub async fn last_results(&self, monitor_id: i64, n: usize) -> Result<Vec<Status>, CheckError> {
        let mut statuses = self.repo.last_statuses(monitor_id).await?;
        if n > 0 && n < statuses.len() {
            statuses.truncate(n);
        }
        Ok(statuses)
    }

    pub async fn list_monitors(&self) -> Result<Vec<Monitor>, CheckError> {
        Ok(self.repo.list_monitors().await?)
    }

    async fn report(&self, status: &Status) {
        let slow = status.available
            && status.latency > Duration::from_millis(self.config.slow_threshold_ms);
        if slow {
            tracing::warn!(
                "Slow response from {}: {:?} over {} ms",
                status.url,
                status.latency,
                self.config.slow_threshold_ms
            );
        }

        let Some(notifier) = &self.notifier else {
            return;
        };

        let result = match self.evaluator.evaluate(status) {
            Some(alert) => notifier.notify(&alert).await,
            None if slow => {
                notifier
                    .notify_status(status, Severity::Warning, "slow response")
                    .await
            }
            None => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!("Failed to notify for {}: {}", status.url, e);
        }
    }
}
