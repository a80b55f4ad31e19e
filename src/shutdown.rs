//! Process shutdown signals.

use std::future::Future;
use std::io;
use tokio_util::sync::CancellationToken;

/// Resolve on the first of Ctrl-C (SIGINT) or SIGTERM, naming the signal.
#[cfg(unix)]
pub async fn terminate_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn terminate_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}

/// Cancel `token` once `signal` fires. A failure to listen leaves it untouched.
pub async fn cancel_on<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = io::Result<&'static str>>,
{
    match signal.await {
        Ok(name) => {
            tracing::info!("Shutdown requested ({})", name);
            token.cancel();
        }
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_cancels_token() {
        let token = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<&'static str>();

        let waiter = tokio::spawn(cancel_on(
            async move { rx.await.map_err(|e| io::Error::new(io::ErrorKind::Other, e)) },
            token.clone(),
        ));
        assert!(!token.is_cancelled());

        tx.send("SIGTERM").unwrap();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_listen_failure_keeps_running() {
        let token = CancellationToken::new();
        cancel_on(
            async { Err(io::Error::new(io::ErrorKind::Unsupported, "no signals")) },
            token.clone(),
        )
        .await;
        assert!(!token.is_cancelled());
    }
}
