//! Integration tests for the job endpoints.

mod helpers;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use tator_core::types::JobId;

async fn enqueue(app: &helpers::TestApp, channel: &str) -> i64 {
    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "channel": channel, "message": { "algorithm_id": 1 } })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["data"]["id"].as_i64().expect("job id")
}

#[tokio::test]
async fn test_enqueue_creates_queued_job() {
    let app = helpers::TestApp::new().await;
    let id = enqueue(&app, "algorithm").await;

    let response = app.request("GET", &format!("/api/jobs/{id}"), None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "queued");
    assert_eq!(response.body["data"]["channel"], "algorithm");
    assert_eq!(response.body["data"]["message"]["algorithm_id"], 1);
    assert!(response.body["data"]["pod_name"].is_null());
}

#[tokio::test]
async fn test_list_filters_by_channel_and_status() {
    let app = helpers::TestApp::new().await;
    let first = enqueue(&app, "algorithm").await;
    enqueue(&app, "transcode").await;
    let third = enqueue(&app, "algorithm").await;
    app.stores
        .jobs
        .mark_started(JobId(third), Utc::now())
        .await
        .unwrap();

    let response = app
        .request("GET", "/api/jobs?channel=algorithm", None, None)
        .await;
    let ids: Vec<i64> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first, third]);

    let response = app
        .request("GET", "/api/jobs?channel=algorithm&status=queued", None, None)
        .await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["data"][0]["id"], first);
}

#[tokio::test]
async fn test_unknown_channel_is_rejected() {
    let app = helpers::TestApp::new().await;
    let response = app
        .request("POST", "/api/jobs", Some(json!({ "channel": "render" })), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_job_is_not_found() {
    let app = helpers::TestApp::new().await;
    let response = app.request("GET", "/api/jobs/999", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_claim_requires_started_job() {
    let app = helpers::TestApp::new().await;
    let id = enqueue(&app, "package").await;
    let path = format!("/api/jobs/{id}/claim");

    let response = app
        .request("POST", &path, Some(json!({ "pod_name": "package-worker-0" })), None)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    app.stores
        .jobs
        .mark_started(JobId(id), Utc::now())
        .await
        .unwrap();
    let response = app
        .request("POST", &path, Some(json!({ "pod_name": "package-worker-0" })), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["pod_name"], "package-worker-0");
    assert_eq!(response.body["data"]["status"], "started");
}

#[tokio::test]
async fn test_claim_validates_pod_name() {
    let app = helpers::TestApp::new().await;
    let id = enqueue(&app, "package").await;
    let response = app
        .request(
            "POST",
            &format!("/api/jobs/{id}/claim"),
            Some(json!({ "pod_name": "" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_removes_row() {
    let app = helpers::TestApp::new().await;
    let id = enqueue(&app, "transcode").await;
    let path = format!("/api/jobs/{id}");

    let response = app.request("DELETE", &path, None, None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app.request("GET", &path, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.request("DELETE", &path, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_detailed_health_reports_backends() {
    let app = helpers::TestApp::new().await;
    let response = app.request("GET", "/api/health/detailed", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["database"], "disabled");
    assert_eq!(response.body["data"]["cache"], "connected");
    assert_eq!(response.body["data"]["ws_connections"], 0);
}
