//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use tator_cache::CacheManager;
use tator_core::config::AppConfig;
use tator_database::store::{AlgorithmStore, JobStore};
use tator_database::{DatabasePool, Stores};
use tator_realtime::RealtimeEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Process start, for uptime
    pub started_at: Instant,

    // ── Infrastructure ───────────────────────────────────────
    /// PostgreSQL pool; absent when the stores are in-memory
    pub db_pool: Option<DatabasePool>,
    /// Shared key/value cache
    pub cache: CacheManager,
    /// Progress pub/sub engine
    pub realtime: RealtimeEngine,

    // ── Stores ───────────────────────────────────────────────
    /// Job queue table
    pub jobs: Arc<dyn JobStore>,
    /// Registered algorithms
    pub algorithms: Arc<dyn AlgorithmStore>,
}

impl AppState {
    /// Assemble the state from already-initialized parts.
    pub fn new(
        config: Arc<AppConfig>,
        stores: &Stores,
        cache: CacheManager,
        realtime: RealtimeEngine,
    ) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            db_pool: stores.pool.clone(),
            cache,
            realtime,
            jobs: stores.jobs.clone(),
            algorithms: stores.algorithms.clone(),
        }
    }
}
