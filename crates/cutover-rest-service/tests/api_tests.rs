//! REST boundary tests driven through `tower::ServiceExt::oneshot`,
//! no sockets involved.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cutover_browser::ScriptedBrowserDriver;
use cutover_core::{JobService, OrchestratorConfig, RuleBasedReasoner, RunOrchestrator};
use cutover_rest_service::{router, AppState};
use cutover_store::SnapshotStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    // Dispatcher intentionally not started: runs stay queued, which
    // keeps these handler tests deterministic.
    let orchestrator = RunOrchestrator::new(
        Arc::clone(&store),
        Arc::new(ScriptedBrowserDriver::builder().build()),
        Arc::new(RuleBasedReasoner),
        OrchestratorConfig::default(),
    );
    let state = AppState {
        jobs: JobService::new(store),
        orchestrator,
    };
    (dir, router(state, None))
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn job_body() -> Value {
    json!({
        "name": "A",
        "baselineUrl": "https://a.test",
        "candidateUrl": "https://b.test"
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn create_job_defaults_and_fetch() {
    let (_dir, app) = app();
    let (status, job) = send(&app, "POST", "/api/jobs", Some(job_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "pending");
    assert_eq!(job["crawlConfig"]["maxDepth"], 1);
    assert_eq!(job["crawlConfig"]["maxPages"], 10);
    assert_eq!(job["crawlConfig"]["followExternalLinks"], false);
    assert_eq!(job["testMatrix"]["visual"], true);
    assert_eq!(job["testMatrix"]["seo"], true);

    let id = job["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, job);

    let (status, list) = send(&app, "GET", "/api/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_urls_are_rejected_with_400() {
    let (_dir, app) = app();
    let body = json!({
        "name": "X",
        "baselineUrl": "https://a.test",
        "candidateUrl": "https://a.test"
    });
    let (status, error) = send(&app, "POST", "/api/jobs", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"].as_str().unwrap().contains("differ"));

    let (_, list) = send(&app, "GET", "/api/jobs", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_crawl_config_is_rejected() {
    let (_dir, app) = app();
    let mut body = job_body();
    body["crawlConfig"] = json!({
        "maxDepth": 0,
        "maxPages": 0,
        "followExternalLinks": false
    });
    let (status, _) = send(&app, "POST", "/api/jobs", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_ids_return_404() {
    let (_dir, app) = app();
    let (status, body) = send(&app, "GET", "/api/jobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, "GET", "/api/runs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/api/jobs/nope/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_applies_partial_changes() {
    let (_dir, app) = app();
    let (_, job) = send(&app, "POST", "/api/jobs", Some(job_body())).await;
    let id = job["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/jobs/{id}"),
        Some(json!({"name": "renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "renamed");
    assert_eq!(updated["baselineUrl"], job["baselineUrl"]);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/jobs/{id}"),
        Some(json!({"candidateUrl": "https://a.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enqueue_returns_202_and_delete_cascades() {
    let (_dir, app) = app();
    let (_, job) = send(&app, "POST", "/api/jobs", Some(job_body())).await;
    let id = job["id"].as_str().unwrap();

    let (status, run1) = send(&app, "POST", &format!("/api/jobs/{id}/run"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(run1["status"], "queued");
    assert_eq!(run1["jobId"], *id);
    assert_eq!(run1["triggeredBy"], "api");

    let (_, run2) = send(
        &app,
        "POST",
        &format!("/api/jobs/{id}/run"),
        Some(json!({"triggeredBy": "nightly"})),
    )
    .await;
    assert_eq!(run2["triggeredBy"], "nightly");

    let (status, runs) = send(&app, "GET", &format!("/api/jobs/{id}/runs"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(runs.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "DELETE", &format!("/api/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, runs) = send(&app, "GET", "/api/runs", None).await;
    assert!(runs.as_array().unwrap().is_empty());
    let run_id = run1["id"].as_str().unwrap();
    let (_, artifacts) = send(&app, "GET", &format!("/api/runs/{run_id}/artifacts"), None).await;
    assert!(artifacts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_transitions_queued_runs_and_conflicts_after() {
    let (_dir, app) = app();
    let (_, job) = send(&app, "POST", "/api/jobs", Some(job_body())).await;
    let id = job["id"].as_str().unwrap();
    let (_, run) = send(&app, "POST", &format!("/api/jobs/{id}/run"), None).await;
    let run_id = run["id"].as_str().unwrap();

    let (status, cancelled) = send(&app, "POST", &format!("/api/runs/{run_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(cancelled["status"], "failed");
    assert!(cancelled["completedAt"].is_string());

    let (status, _) = send(&app, "POST", &format!("/api/runs/{run_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn migrate_endpoint_reports_zero_on_clean_state() {
    let (_dir, app) = app();
    let (status, body) = send(&app, "POST", "/api/jobs/migrate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}
