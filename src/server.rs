//! Status web surface.
//!
//! | Route                 | Response                                              |
//! |-----------------------|-------------------------------------------------------|
//! | `GET /health`         | `OK`                                                  |
//! | `GET /`               | `{"status":"ok","worker_running":..,"processed_count":..}` |
//! | `GET /status`         | full [`WorkerStatus`](crate::WorkerStatus) snapshot   |
//! | `POST /trigger_once`  | `{"results":[..]}` or `500 {"error":".."}`            |
//!
//! A trigger opens its own mail session and does not touch the poll loop's counters.

use crate::fetcher::Fetcher;
use crate::links::LinkFinder;
use crate::mailbox::MailConnector;
use crate::pipeline;
use crate::status::StatusHandle;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the status routes.
#[derive(Clone)]
pub struct AppState {
    /// Status written by the poll loop.
    pub status: StatusHandle,
    /// Opens the trigger's dedicated session.
    pub connector: Arc<dyn MailConnector>,
    /// Issues confirmation requests for triggered scans.
    pub fetcher: Arc<dyn Fetcher>,
    /// Link selection rules.
    pub finder: Arc<LinkFinder>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("status", &self.status)
            .field("finder", &self.finder)
            .finish_non_exhaustive()
    }
}

/// Builds the status routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/status", get(status))
        .route("/trigger_once", post(trigger_once))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.status.snapshot();
    Json(json!({
        "status": "ok",
        "worker_running": snapshot.running,
        "processed_count": snapshot.processed_count,
    }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status.snapshot())
}

/// POST /trigger_once
///
/// Runs one scan synchronously on a fresh session.
async fn trigger_once(State(state): State<AppState>) -> Response {
    let scan = pipeline::scan_once(
        state.connector.as_ref(),
        &state.finder,
        state.fetcher.as_ref(),
    )
    .await;

    match scan {
        Ok(results) => {
            info!(count = results.len(), "Manual scan finished");
            Json(json!({ "results": results })).into_response()
        }
        Err(e) => {
            error!(error = %e, category = %e.category(), "Manual scan failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
