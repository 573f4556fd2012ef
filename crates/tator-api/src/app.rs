//! Application builder: wires stores, cache, and the realtime engine into
//! an [`AppState`] and serves the router.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use tator_cache::CacheManager;
use tator_core::config::AppConfig;
use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_database::Stores;
use tator_realtime::RealtimeEngine;

use crate::router::build_router;
use crate::state::AppState;

/// Build the state for `config` on top of already-opened `stores`.
pub async fn build_state(config: AppConfig, stores: &Stores) -> AppResult<AppState> {
    info!(provider = %config.cache.provider, "Initializing cache");
    let cache = CacheManager::new(&config.cache).await?;

    info!(pubsub = %config.realtime.pubsub, "Initializing realtime engine");
    let realtime =
        RealtimeEngine::from_config(&config.realtime, cache.clone(), stores.memberships.clone())
            .await?;

    Ok(AppState::new(Arc::new(config), stores, cache, realtime))
}

/// Bind the configured address and serve until `shutdown` resolves. Open
/// progress streams are closed before returning.
pub async fn serve<F>(state: AppState, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e)
    })?;
    info!(addr = %addr, "Tator API listening");

    let realtime = state.realtime.clone();
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received, closing progress streams");
            realtime.shutdown().await;
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    info!("Tator API stopped");
    Ok(())
}
