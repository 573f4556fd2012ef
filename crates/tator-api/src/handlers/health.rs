//! Health check handlers.

use axum::Json;
use axum::extract::State;

use tator_core::traits::cache::CacheProvider;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let cache_ok = matches!(state.cache.health_check().await, Ok(true));
    let database = match &state.db_pool {
        Some(pool) => match pool.health_check().await {
            Ok(true) => "connected",
            _ => "unreachable",
        },
        None => "disabled",
    };
    let healthy = cache_ok && database != "unreachable";

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database: database.to_string(),
        cache: if cache_ok { "connected" } else { "unreachable" }.to_string(),
        ws_connections: state.realtime.connections.connection_count(),
        realtime: state.realtime.metrics.snapshot(),
    }))
}
