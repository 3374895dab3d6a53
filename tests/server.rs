//! Status routes driven through `tower::ServiceExt::oneshot`.

mod common;

use auto_confirm::server::{router, AppState};
use auto_confirm::{LinkFinder, MessageRef, ProcessingResult, StatusHandle, WorkerState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{html_message, FakeServer, RecordingFetcher, CONFIRM_URL, REDIRECT_HREF};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(server: &FakeServer, fetcher: &RecordingFetcher, status: &StatusHandle) -> Router {
    router(AppState {
        status: status.clone(),
        connector: Arc::new(server.clone()),
        fetcher: Arc::new(fetcher.clone()),
        finder: Arc::new(LinkFinder::default()),
    })
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = app(&FakeServer::new(), &RecordingFetcher::new(), &StatusHandle::new());
    let (status, body) = send(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_index_summary() {
    let status = StatusHandle::new();
    status.start(WorkerState::Polling);
    status.record(ProcessingResult::skipped(MessageRef::new(1), "no-link"));

    let app = app(&FakeServer::new(), &RecordingFetcher::new(), &status);
    let (code, json) = send_json(app, "GET", "/").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["worker_running"], true);
    assert_eq!(json["processed_count"], 1);
}

#[tokio::test]
async fn test_status_snapshot_before_any_work() {
    let app = app(&FakeServer::new(), &RecordingFetcher::new(), &StatusHandle::new());
    let (code, json) = send_json(app, "GET", "/status").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["running"], false);
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["processed_count"], 0);
    assert!(json["last_result"].is_null());
}

#[tokio::test]
async fn test_trigger_once_returns_results_without_touching_counters() {
    let server = FakeServer::new();
    server.deliver(12, html_message(REDIRECT_HREF));
    let fetcher = RecordingFetcher::new();
    let status = StatusHandle::new();

    let (code, json) = send_json(app(&server, &fetcher, &status), "POST", "/trigger_once").await;

    assert_eq!(code, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["uid"], 12);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[0]["info"], format!("status=200,final={CONFIRM_URL}"));

    assert_eq!(fetcher.requested(), vec![CONFIRM_URL.to_string()]);
    assert_eq!(server.processed(), vec![12]);
    assert_eq!(status.processed_count(), 0);
}

#[tokio::test]
async fn test_trigger_once_empty_mailbox() {
    let server = FakeServer::new();
    let (code, json) = send_json(
        app(&server, &RecordingFetcher::new(), &StatusHandle::new()),
        "POST",
        "/trigger_once",
    )
    .await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["results"], serde_json::json!([]));
}

#[tokio::test]
async fn test_trigger_once_connect_failure_is_500() {
    let server = FakeServer::new();
    server.refuse_connects(true);

    let (code, json) = send_json(
        app(&server, &RecordingFetcher::new(), &StatusHandle::new()),
        "POST",
        "/trigger_once",
    )
    .await;

    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("imap.test:993"));
}

#[tokio::test]
async fn test_trigger_requires_post() {
    let app = app(&FakeServer::new(), &RecordingFetcher::new(), &StatusHandle::new());
    let (code, _) = send(app, "GET", "/trigger_once").await;

    assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
}
