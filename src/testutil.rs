//! Local HTTP targets for probe tests.

use async_trait::async_trait;
use axum::{http::StatusCode, response::Redirect, routing::get, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::db::{DbError, Monitor, Repository, Status};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve `code` on every path after sleeping for `delay`.
pub async fn spawn_target(code: u16, delay: Duration) -> String {
    let handler = move || async move {
        tokio::time::sleep(delay).await;
        StatusCode::from_u16(code).unwrap()
    };
    serve(Router::new().route("/", get(handler)).fallback(handler)).await
}

/// Serve an endless chain of temporary redirects.
pub async fn spawn_redirect_loop() -> String {
    let app = Router::new().route("/loop", get(|| async { Redirect::temporary("/loop") }));
    format!("{}/loop", serve(app).await)
}

/// Answer 200 with a body of `len` bytes, announcing twice that length and
/// then stalling with the connection open.
pub async fn spawn_stalled_body_target(len: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n",
                    len * 2
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&vec![b'x'; len]).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// An address nothing listens on.
pub async fn unused_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Request counters observed by [`spawn_counting_target`].
#[derive(Default)]
pub struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    total: AtomicUsize,
}

impl Counters {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Serve 200 after `delay` while tracking concurrent requests.
pub async fn spawn_counting_target(delay: Duration) -> (String, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let state = counters.clone();

    let handler = move || {
        let counters = state.clone();
        async move {
            counters.total.fetch_add(1, Ordering::SeqCst);
            let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            StatusCode::OK
        }
    };

    let url = serve(Router::new().route("/", get(handler.clone())).fallback(handler)).await;
    (url, counters)
}

/// Lists nothing and refuses every write.
pub struct BrokenRepo;

#[async_trait]
impl Repository for BrokenRepo {
    async fn list_monitors(&self) -> Result<Vec<Monitor>, DbError> {
        Err(DbError::Poisoned)
    }
    async fn add_monitor(&self, _monitor: &Monitor) -> Result<Monitor, DbError> {
        Err(DbError::Poisoned)
    }
    async fn delete_monitor(&self, _url: &str) -> Result<(), DbError> {
        Err(DbError::Poisoned)
    }
    async fn record_status(&self, _status: &Status) -> Result<(), DbError> {
        Err(DbError::Poisoned)
    }
    async fn last_statuses(&self, _monitor_id: i64) -> Result<Vec<Status>, DbError> {
        Err(DbError::Poisoned)
    }
    async fn delete_all(&self) -> Result<(), DbError> {
        Err(DbError::Poisoned)
    }
}
