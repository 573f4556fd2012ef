//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use tator_api::AppState;
use tator_cache::CacheManager;
use tator_core::config::AppConfig;
use tator_core::traits::cache::CacheProvider;
use tator_core::types::{ProjectId, UserId};
use tator_database::Stores;
use tator_entity::progress::JobType;
use tator_realtime::RealtimeEngine;

/// Test application context backed by in-memory stores and cache.
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Stores behind the router
    pub stores: Stores,
    /// Cache behind the producer and consumers
    pub cache: CacheManager,
    /// Progress engine
    pub realtime: RealtimeEngine,
    /// Application config
    pub config: AppConfig,
}

/// Parsed response of a test request
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body, or `Null` when empty
    pub body: Value,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let config = AppConfig::default();
        let stores = Stores::in_memory();
        let cache = CacheManager::in_memory();
        let realtime =
            RealtimeEngine::new(&config.realtime, cache.clone(), stores.memberships.clone());
        let state = AppState::new(
            Arc::new(config.clone()),
            &stores,
            cache.clone(),
            realtime.clone(),
        );

        Self {
            router: tator_api::build_router(state),
            stores,
            cache,
            realtime,
            config,
        }
    }

    /// Make `user` a member of `project`
    pub async fn add_member(&self, user: i64, project: i64) {
        self.stores
            .memberships
            .add(UserId(user), ProjectId(project))
            .await
            .expect("Failed to add membership");
    }

    /// Entries of a group's latest-state hash, keyed by uid or gid
    pub async fn latest(&self, prefix: JobType, project: i64) -> Vec<(String, Value)> {
        let key = tator_cache::keys::latest(prefix, ProjectId(project));
        let mut entries: Vec<(String, Value)> = self
            .cache
            .hgetall(&key)
            .await
            .expect("Failed to read latest hash")
            .into_iter()
            .map(|(field, raw)| (field, serde_json::from_str(&raw).expect("latest entry is JSON")))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        user: Option<i64>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        if let Some(user) = user {
            req = req.header("x-user-id", user.to_string());
        }

        let response = self
            .router
            .clone()
            .oneshot(req.body(Body::from(body_str)).expect("Failed to build request"))
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Serve the router on an ephemeral local port
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Test server failed");
        });
        addr
    }
}

/// A progress message as a worker would post it
pub fn progress(job_type: &str, gid: &str, uid: &str, state: &str, pct: Option<u8>) -> Value {
    let mut msg = serde_json::json!({
        "job_type": job_type,
        "gid": gid,
        "uid": uid,
        "name": format!("{uid}.mp4"),
        "state": state,
        "message": format!("{state} {uid}"),
    });
    if let Some(pct) = pct {
        msg["progress"] = pct.into();
    }
    msg
}
