//! uptrail - HTTP endpoint health checker
//!
//! Probes registered endpoints on a fixed schedule, records their availability
//! and latency, and raises alerts for failures.

mod alert;
mod checker;
mod config;
mod db;
mod probe;
mod scheduler;
mod shutdown;
mod web;

#[cfg(test)]
mod testutil;

use alert::{Evaluator, LogNotifier};
use checker::CheckerService;
use config::ServerConfig;
use db::{Repository, Store};
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting uptrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let repo: Arc<dyn Repository> = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let checker = Arc::new(
        CheckerService::new(repo.clone(), cfg.checker(), Evaluator::new(&cfg.base_url))?
            .with_notifier(Arc::new(LogNotifier)),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on(
        shutdown::terminate_signal(),
        shutdown.clone(),
    ));

    // Start scheduler
    let scheduler = Scheduler::new(repo.clone(), checker.clone(), cfg.check_interval());
    scheduler.start(&shutdown);

    // Serve until shutdown, then drain the scheduler
    let server = Server::new(cfg, repo, checker, shutdown.clone());
    let served = server.start().await;

    shutdown.cancel();
    scheduler.stop().await;
    tracing::info!("uptrail stopped");

    served
}
