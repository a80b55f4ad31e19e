//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Monitor, Status};
use crate::probe::normalize_url;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Deadline for checks requested through the API.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_RESULTS_LIMIT: usize = 50;

/// Status as exposed to API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusView {
    pub available: bool,
    pub code: u16,
    pub latency_ms: u64,
    pub error_message: String,
    pub checked_at: DateTime<Utc>,
    pub url: String,
}

impl From<&Status> for StatusView {
    fn from(s: &Status) -> Self {
        Self {
            available: s.available,
            code: s.code,
            latency_ms: u64::try_from(s.latency.as_millis()).unwrap_or(u64::MAX),
            error_message: s.error_message.clone(),
            checked_at: s.checked_at,
            url: s.url.clone(),
        }
    }
}

fn views(statuses: &[Status]) -> Vec<StatusView> {
    statuses.iter().map(StatusView::from).collect()
}

// ============================================================================
// API: Checks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn handle_verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> impl IntoResponse {
    let url = match &body {
        Ok(Json(req)) if !req.url.trim().is_empty() => req.url.trim(),
        _ => {
            return (StatusCode::BAD_REQUEST, "invalid body: expected {\"url\":\"...\"}")
                .into_response()
        }
    };

    let cancel = state.shutdown.child_token();
    let result = match state.checker.track_url(url).await {
        Ok(monitor) => {
            state
                .checker
                .verify_monitor(&monitor, &cancel, Some(VERIFY_TIMEOUT))
                .await
        }
        // Still answer with an ad hoc check when the monitor cannot be registered.
        Err(e) => {
            tracing::warn!("Failed to register monitor for {}: {}", url, e);
            state.checker.verify_url(url, &cancel).await
        }
    };

    match result {
        Ok(status) => Json(json!({ "status": StatusView::from(&status) })).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Results
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn handle_get_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let monitors = match state.repo.list_monitors().await {
        Ok(m) => m,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let mut all = Vec::new();
    for monitor in &monitors {
        match state.repo.last_statuses(monitor.id).await {
            Ok(statuses) => all.extend(statuses),
            Err(e) => tracing::warn!("Failed to load statuses for {}: {}", monitor.url, e),
        }
    }
    all.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));

    let limit = query
        .limit
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_RESULTS_LIMIT);
    all.truncate(limit);

    Json(json!({ "results": views(&all) })).into_response()
}

pub async fn handle_delete_results(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.delete_all().await {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Monitors
// ============================================================================

pub async fn handle_get_monitors(State(state): State<AppState>) -> impl IntoResponse {
    match state.checker.list_monitors().await {
        Ok(monitors) => Json(monitors).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_create_monitor(
    State(state): State<AppState>,
    Json(mut monitor): Json<Monitor>,
) -> impl IntoResponse {
    if monitor.url.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Monitor URL is required").into_response();
    }
    monitor.id = 0;
    monitor.url = normalize_url(&monitor.url);

    match state.repo.add_monitor(&monitor).await {
        Ok(stored) => Json(stored).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct MonitorQuery {
    pub url: String,
}

pub async fn handle_delete_monitor(
    State(state): State<AppState>,
    Query(query): Query<MonitorQuery>,
) -> impl IntoResponse {
    match state.repo.delete_monitor(&query.url).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(DbError::NotFound) => (StatusCode::NOT_FOUND, "Monitor not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LastResultsQuery {
    #[serde(default)]
    pub n: usize,
}

pub async fn handle_monitor_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<LastResultsQuery>,
) -> impl IntoResponse {
    match state.checker.last_results(id, query.n).await {
        Ok(statuses) => Json(json!({ "results": views(&statuses) })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::super::Server;
    use super::*;
    use crate::alert::Evaluator;
    use crate::checker::{CheckerConfig, CheckerService};
    use crate::config::ServerConfig;
    use crate::db::Store;
    use crate::testutil::spawn_target;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn spawn_api() -> (String, CancellationToken) {
        let store = Arc::new(Store::in_memory().unwrap());
        let checker = Arc::new(
            CheckerService::new(store.clone(), CheckerConfig::default(), Evaluator::new("")).unwrap(),
        );
        let shutdown = CancellationToken::new();
        let server = Server::new(ServerConfig::default(), store, checker, shutdown.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server.routes();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}", addr), shutdown)
    }

    #[tokio::test]
    async fn test_health() {
        let (api, _shutdown) = spawn_api().await;
        let body = reqwest::get(format!("{}/api/health", api))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_verify_rejects_blank_url() {
        let (api, _shutdown) = spawn_api().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/verify", api))
            .json(&json!({ "url": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = client
            .post(format!("{}/api/verify", api))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_tracks_monitor_and_lists_results() {
        let (api, _shutdown) = spawn_api().await;
        let client = reqwest::Client::new();
        let target = spawn_target(503, Duration::ZERO).await;

        let body: serde_json::Value = client
            .post(format!("{}/api/verify", api))
            .json(&json!({ "url": target }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let status: StatusView = serde_json::from_value(body["status"].clone()).unwrap();
        assert!(!status.available);
        assert_eq!(status.code, 503);

        let monitors: Vec<Monitor> = client
            .get(format!("{}/api/monitors", api))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].url, target);

        let results: serde_json::Value = client
            .get(format!("{}/api/monitors/{}/results?n=1", api, monitors[0].id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(results["results"].as_array().unwrap().len(), 1);

        let resp = client.delete(format!("{}/api/results", api)).send().await.unwrap();
        assert!(resp.status().is_success());

        let results: serde_json::Value = client
            .get(format!("{}/api/results", api))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(results["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_create_and_delete() {
        let (api, _shutdown) = spawn_api().await;
        let client = reqwest::Client::new();

        let created: Monitor = client
            .post(format!("{}/api/monitors", api))
            .json(&json!({ "name": "Example", "url": "example.com" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(created.url, "http://example.com");
        assert_eq!(created.kind, "http");

        let resp = client
            .delete(format!("{}/api/monitors", api))
            .query(&[("url", "http://example.com")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        let resp = client
            .delete(format!("{}/api/monitors", api))
            .query(&[("url", "http://example.com")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
