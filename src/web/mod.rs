//! Web server module.

mod handlers;

use crate::checker::CheckerService;
use crate::config::ServerConfig;
use crate::db::Repository;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub checker: Arc<CheckerService>,
    /// Cancelled on shutdown; in-flight checks derive from it.
    pub shutdown: CancellationToken,
}

/// Web server for uptrail.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        repo: Arc<dyn Repository>,
        checker: Arc<CheckerService>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            state: AppState {
                repo,
                checker,
                shutdown,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/verify", post(handlers::handle_verify))
            .route(
                "/api/results",
                get(handlers::handle_get_results).delete(handlers::handle_delete_results),
            )
            .route(
                "/api/monitors",
                get(handlers::handle_get_monitors)
                    .post(handlers::handle_create_monitor)
                    .delete(handlers::handle_delete_monitor),
            )
            .route("/api/monitors/{id}/results", get(handlers::handle_monitor_results))
            .route("/api/health", get(handlers::handle_health))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until the shutdown token fires.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}
