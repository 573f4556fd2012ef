//! End-to-end admission: jobs enqueued over HTTP, dispatched by the
//! scheduler, then claimed and completed by a worker runner.

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};

use helpers::TestApp;
use tator_core::config::scheduler::SchedulerConfig;
use tator_core::types::UserId;
use tator_entity::job::{DispatchedJob, JobChannel};
use tator_worker::cluster::StaticClusterApi;
use tator_worker::queue::MemoryWorkerQueue;
use tator_worker::runner::RunOutcome;
use tator_worker::{
    DispatchScheduler, HttpProgressReporter, JobExecutionError, JobExecutor, JobHandler,
    ManualClock, WorkerQueue, WorkerQueueRegistry, WorkerRunner,
};

#[derive(Debug, Default)]
struct Recording {
    runs: AtomicUsize,
    fail_with: Option<&'static str>,
}

#[async_trait]
impl JobHandler for Recording {
    fn channel(&self) -> JobChannel {
        JobChannel::Algorithm
    }

    async fn execute(&self, _job: &DispatchedJob) -> Result<Option<Value>, JobExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.fail_with {
            Some(reason) => Err(JobExecutionError::Permanent(reason.to_string())),
            None => Ok(None),
        }
    }
}

struct Cluster {
    app: TestApp,
    pods: Arc<StaticClusterApi>,
    queue: Arc<MemoryWorkerQueue>,
    clock: Arc<ManualClock>,
    scheduler: DispatchScheduler,
}

async fn cluster(pods: &[&str]) -> Cluster {
    let app = TestApp::new().await;
    let config = SchedulerConfig::default();
    let mut initial = HashMap::new();
    initial.insert(
        config.algorithm.app_label.clone(),
        pods.iter().map(|p| p.to_string()).collect(),
    );
    let pods = Arc::new(StaticClusterApi::new(initial));
    let queue = Arc::new(MemoryWorkerQueue::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let scheduler = DispatchScheduler::new(
        app.stores.jobs.clone(),
        app.stores.algorithms.clone(),
        pods.clone(),
        WorkerQueueRegistry::from_config(&config, queue.clone()),
        clock.clone(),
        config,
    );
    Cluster {
        app,
        pods,
        queue,
        clock,
        scheduler,
    }
}

async fn enqueue(app: &TestApp, message: Value) -> i64 {
    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "channel": "algorithm", "message": message })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["data"]["id"].as_i64().expect("job id")
}

async fn status_of(app: &TestApp, id: i64) -> Option<String> {
    let response = app.request("GET", &format!("/api/jobs/{id}"), None, None).await;
    match response.status {
        StatusCode::OK => response.body["data"]["status"].as_str().map(str::to_string),
        _ => None,
    }
}

fn runner(c: &Cluster, handler: Arc<Recording>, pod: &str) -> WorkerRunner {
    let registry = WorkerQueueRegistry::from_config(&SchedulerConfig::default(), c.queue.clone());
    let route = registry
        .route(JobChannel::Algorithm)
        .expect("algorithm route")
        .clone();
    let mut executor = JobExecutor::new();
    executor.register(handler);
    WorkerRunner::new(
        JobChannel::Algorithm,
        pod,
        route,
        c.app.stores.jobs.clone(),
        Arc::new(executor),
        c.clock.clone(),
    )
    .with_pop_timeout(Duration::from_millis(20))
}

#[tokio::test]
async fn test_limit_holds_until_worker_finishes() {
    let c = cluster(&["algo-1", "algo-2"]).await;
    let algorithm = c
        .app
        .stores
        .algorithms
        .create("detector", 1)
        .await
        .expect("create algorithm");
    let message = json!({ "algorithm_id": algorithm.id, "media_ids": [7] });
    let first = enqueue(&c.app, message.clone()).await;
    let second = enqueue(&c.app, message).await;

    let report = c
        .scheduler
        .run_channel(JobChannel::Algorithm)
        .await
        .expect("first pass");
    assert_eq!(report.live_pods, 2);
    assert_eq!(report.dispatched, 1);
    assert_eq!(status_of(&c.app, first).await.as_deref(), Some("started"));
    assert_eq!(status_of(&c.app, second).await.as_deref(), Some("queued"));

    let payload = c
        .queue
        .pop("algorithm", Duration::from_millis(20))
        .await
        .expect("pop")
        .expect("dispatched payload");
    let sent: Value = serde_json::from_str(&payload).expect("payload is JSON");
    assert_eq!(sent["job_id"], json!(first));
    assert_eq!(sent["media_ids"], json!([7]));

    let handler = Arc::new(Recording::default());
    let worker = runner(&c, handler.clone(), "algo-1");
    assert_eq!(worker.process(&payload).await, RunOutcome::Completed);
    assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
    assert_eq!(status_of(&c.app, first).await, None);

    let report = c
        .scheduler
        .run_channel(JobChannel::Algorithm)
        .await
        .expect("second pass");
    assert_eq!(report.dispatched, 1);
    assert_eq!(status_of(&c.app, second).await.as_deref(), Some("started"));
}

#[tokio::test]
async fn test_job_on_dead_pod_is_requeued_and_redispatched() {
    let c = cluster(&["algo-1"]).await;
    let id = enqueue(&c.app, json!({ "command": ["true"] })).await;

    let report = c
        .scheduler
        .run_channel(JobChannel::Algorithm)
        .await
        .expect("first pass");
    assert_eq!(report.dispatched, 1);

    let claimed = c
        .app
        .request(
            "POST",
            &format!("/api/jobs/{id}/claim"),
            Some(json!({ "pod_name": "algo-1" })),
            None,
        )
        .await;
    assert_eq!(claimed.status, StatusCode::OK);
    assert_eq!(claimed.body["data"]["pod_name"], "algo-1");

    c.pods
        .set_pods("algorithm-worker", vec!["algo-2".to_string()])
        .await;
    c.clock.advance(Duration::from_secs(120));

    let report = c
        .scheduler
        .run_channel(JobChannel::Algorithm)
        .await
        .expect("second pass");
    assert_eq!(report.requeued, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(status_of(&c.app, id).await.as_deref(), Some("started"));
    assert_eq!(c.queue.peek_all("algorithm").len(), 2);
}

#[tokio::test]
async fn test_no_live_pods_leaves_jobs_queued() {
    let c = cluster(&[]).await;
    let id = enqueue(&c.app, json!({ "command": ["true"] })).await;

    let reports = c.scheduler.run_iteration().await;
    let algorithm = reports
        .iter()
        .find(|r| r.channel == JobChannel::Algorithm)
        .expect("algorithm report");
    assert_eq!(algorithm.live_pods, 0);
    assert_eq!(algorithm.dispatched, 0);
    assert_eq!(status_of(&c.app, id).await.as_deref(), Some("queued"));
    assert!(c.queue.peek_all("algorithm").is_empty());
}

#[tokio::test]
async fn test_failed_job_is_reported_to_subscribers_before_removal() {
    let c = cluster(&["algo-1"]).await;
    c.app.add_member(5, 1).await;
    let addr = c.app.spawn().await;

    let (mut consumer, mut rx) = c.app.realtime.open(UserId(5));
    consumer.join().await.expect("join");

    let id = enqueue(
        &c.app,
        json!({ "project_id": 1, "gid": "run-9", "uid": "clip-3", "name": "clip.mp4" }),
    )
    .await;
    c.scheduler
        .run_channel(JobChannel::Algorithm)
        .await
        .expect("dispatch pass");
    let payload = c
        .queue
        .pop("algorithm", Duration::from_millis(20))
        .await
        .expect("pop")
        .expect("dispatched payload");

    let handler = Arc::new(Recording {
        fail_with: Some("decoder crashed"),
        ..Recording::default()
    });
    let reporter = HttpProgressReporter::new(&format!("http://{addr}"), Duration::from_secs(5))
        .expect("reporter");
    let worker = runner(&c, handler, "algo-1").with_progress_reporter(Arc::new(reporter));
    assert_eq!(worker.process(&payload).await, RunOutcome::Failed);
    assert_eq!(status_of(&c.app, id).await, None);

    let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("connection closed");
    let msg: Value = serde_json::from_str(&raw).expect("broadcast is JSON");
    assert_eq!(msg["state"], "failed");
    assert_eq!(msg["uid"], "clip-3");
    assert_eq!(msg["gid"], "run-9");
    assert!(msg["message"].as_str().unwrap_or_default().contains("decoder crashed"));

    consumer.close().await;
}
