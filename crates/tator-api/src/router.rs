//! Route definitions for the Tator job API.
//!
//! REST routes are mounted under `/api`; the progress stream lives at
//! `/ws/progress`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes;

    let api_routes = Router::new()
        .merge(progress_routes())
        .merge(job_routes())
        .merge(health_routes());

    let ws_routes = Router::new().route("/ws/progress", get(handlers::ws::progress_ws));

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Worker progress ingress
fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress/{project_id}", post(handlers::progress::post_progress))
        .route(
            "/progress-summary/{project_id}",
            post(handlers::progress::post_summary),
        )
}

/// Job table
fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route(
            "/jobs/{id}",
            get(handlers::jobs::get_job).delete(handlers::jobs::delete_job),
        )
        .route("/jobs/{id}/claim", post(handlers::jobs::claim_job))
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use tator_cache::CacheManager;
    use tator_core::config::AppConfig;
    use tator_database::Stores;
    use tator_realtime::RealtimeEngine;

    fn router(config: AppConfig) -> Router {
        let stores = Stores::in_memory();
        let cache = CacheManager::in_memory();
        let realtime =
            RealtimeEngine::new(&config.realtime, cache.clone(), stores.memberships.clone());
        build_router(AppState::new(Arc::new(config), &stores, cache, realtime))
    }

    #[tokio::test]
    async fn health_is_served_under_api() {
        let response = router(AppConfig::default())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = AppConfig::default();
        config.server.max_body_bytes = 64;
        let body = format!("[{}]", "0,".repeat(100) + "0");
        let response = router(config)
            .oneshot(
                Request::post("/api/progress/1")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn progress_stream_requires_identity() {
        let response = router(AppConfig::default())
            .oneshot(Request::get("/ws/progress").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert!(response.status().is_client_error());
    }
}
