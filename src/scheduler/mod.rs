//! Scheduler module for periodic checks of every monitor.

use crate::checker::CheckerService;
use crate::db::Repository;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

enum State {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
}

/// Runs a check cycle immediately on start and then once per interval.
pub struct Scheduler {
    repo: Arc<dyn Repository>,
    checker: Arc<CheckerService>,
    interval: Duration,
    state: Mutex<State>,
}

impl Scheduler {
    /// Create an idle scheduler. A zero interval means the default.
    pub fn new(repo: Arc<dyn Repository>, checker: Arc<CheckerService>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_CHECK_INTERVAL
        } else {
            interval
        };

        Self {
            repo,
            checker,
            interval,
            state: Mutex::new(State::Idle),
        }
    }

    /// Start the background loop. Does nothing when already running.
    pub fn start(&self, parent: &CancellationToken) {
        let mut state = self.state();
        if matches!(*state, State::Running { .. }) {
            return;
        }

        let cancel = parent.child_token();
        let handle = tokio::spawn(run_loop(
            self.repo.clone(),
            self.checker.clone(),
            self.interval,
            cancel.clone(),
        ));
        *state = State::Running { cancel, handle };

        tracing::info!("Scheduler: started with interval {:?}", self.interval);
    }

    /// Cancel the loop and wait until it and any in-flight cycle have
    /// drained. Does nothing when idle.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state(), State::Idle);

        if let State::Running { cancel, handle } = previous {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::error!("Scheduler: background task failed: {}", e);
            }
            tracing::info!("Scheduler: stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state(), State::Running { .. })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop(
    repo: Arc<dyn Repository>,
    checker: Arc<CheckerService>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    // A cycle that overruns pushes the next one back instead of bunching ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                run_cycle(repo.as_ref(), &checker, &cancel).await;
            }
        }
    }
}

/// Probe every monitor once and wait for all probes to finish.
///
/// Returns the number of monitors probed. A listing failure skips the cycle.
pub async fn run_cycle(
    repo: &dyn Repository,
    checker: &Arc<CheckerService>,
    cancel: &CancellationToken,
) -> usize {
    let monitors = match repo.list_monitors().await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("Scheduler: failed to list monitors, skipping cycle: {}", e);
            return 0;
        }
    };

    if monitors.is_empty() {
        return 0;
    }

    let count = monitors.len();
    let mut tasks = JoinSet::new();

    for monitor in monitors {
        let checker = checker.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move { checker.verify_monitor(&monitor, &cancel, None).await });
    }

    let mut down = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(status)) if !status.available => down += 1,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("Scheduler: check failed: {}", e),
            Err(e) => tracing::error!("Scheduler: check task panicked: {}", e),
        }
    }

    tracing::info!("Scheduler: cycle probed {} monitors, {} down", count, down);
    count
}
