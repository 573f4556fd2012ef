//! Integration tests for the progress ingress.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::progress;
use tator_core::types::ProjectId;
use tator_entity::progress::JobType;

#[tokio::test]
async fn test_queued_job_is_announced_as_started_at_zero() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/progress/1",
            Some(json!([progress("upload", "g1", "u1", "queued", None)])),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["accepted"], 1);

    let latest = app.latest(JobType::Upload, 1).await;
    let fields: Vec<&str> = latest.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(fields, vec!["g1", "u1"]);

    let (_, job) = &latest[1];
    assert_eq!(job["type"], "progress");
    assert_eq!(job["state"], "started");
    assert_eq!(job["progress"], 0);

    let (_, summary) = &latest[0];
    assert_eq!(summary["type"], "progress_summary");
    assert_eq!(summary["num_procs"], 1);
    assert_eq!(summary["num_complete"], 0);
}

#[tokio::test]
async fn test_progress_is_broadcast_to_group() {
    let app = helpers::TestApp::new().await;
    let group = tator_cache::keys::group(JobType::Algorithm, ProjectId(4));
    let mut rx = app.realtime.bus.subscribe(&group).await;

    let mut msg = progress("algorithm", "g", "u", "started", Some(55));
    msg["section"] = json!("Batch 7");
    let response = app
        .request("POST", "/api/progress/4", Some(json!([msg])), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let raw = rx.recv().await.expect("broadcast");
    let wire: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(wire["progress"], 55);
    assert_eq!(wire["project_id"], 4);
    assert_eq!(wire["section"], "Batch 7");
}

#[tokio::test]
async fn test_finishing_last_job_collects_group() {
    let app = helpers::TestApp::new().await;
    let batch = json!([
        progress("download", "g", "a", "queued", None),
        progress("download", "g", "b", "queued", None),
    ]);
    app.request("POST", "/api/progress/2", Some(batch), None).await;

    let mut done = progress("download", "g", "a", "finished", None);
    done["aux"] = json!({ "url": "/media/a.zip" });
    app.request("POST", "/api/progress/2", Some(json!([done])), None)
        .await;

    let latest = app.latest(JobType::Download, 2).await;
    let fields: Vec<&str> = latest.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(fields, vec!["b", "g"]);
    assert_eq!(latest[1].1["num_complete"], 1);

    app.request(
        "POST",
        "/api/progress/2",
        Some(json!([progress("download", "g", "b", "failed", None)])),
        None,
    )
    .await;
    assert!(app.latest(JobType::Download, 2).await.is_empty());
}

#[tokio::test]
async fn test_invalid_batch_is_rejected_whole() {
    let app = helpers::TestApp::new().await;
    let batch = json!([
        progress("upload", "g", "ok", "started", Some(10)),
        progress("upload", "g", "bad", "started", Some(101)),
    ]);

    let response = app
        .request("POST", "/api/progress/1", Some(batch), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
    assert!(app.latest(JobType::Upload, 1).await.is_empty());
}

#[tokio::test]
async fn test_unknown_state_is_rejected() {
    let app = helpers::TestApp::new().await;
    let response = app
        .request(
            "POST",
            "/api/progress/1",
            Some(json!([progress("upload", "g", "u", "paused", None)])),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summary_endpoint_mirrors_and_collects() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/progress-summary/3",
            Some(json!({
                "job_type": "algorithm", "gid": "run-9", "num_jobs": 4,
                "num_complete": 1, "name": "Tracker"
            })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let latest = app.latest(JobType::Algorithm, 3).await;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].0, "run-9");
    assert_eq!(latest[0].1["num_procs"], 4);
    assert_eq!(latest[0].1["name"], "Tracker");

    app.request(
        "POST",
        "/api/progress-summary/3",
        Some(json!({
            "job_type": "algorithm", "gid": "run-9", "num_jobs": 4, "num_complete": 4
        })),
        None,
    )
    .await;
    assert!(app.latest(JobType::Algorithm, 3).await.is_empty());
}

#[tokio::test]
async fn test_worker_heartbeat_is_recorded() {
    use tator_core::traits::cache::CacheProvider;

    let app = helpers::TestApp::new().await;
    let mut msg = progress("upload", "g", "u", "started", Some(20));
    msg["swid"] = json!("worker-3");
    app.request("POST", "/api/progress/1", Some(json!([msg])), None)
        .await;

    let beat = app
        .cache
        .get(&tator_cache::keys::swid_heartbeat("worker-3"))
        .await
        .unwrap();
    assert!(beat.is_some());
}
