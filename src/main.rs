//! Tator job server.
//!
//! Serves the progress ingress, job endpoints, and WebSocket progress
//! stream. With `scheduler.embedded` the dispatch loop runs in the same
//! process.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_database::Stores;
use tator_worker::DispatchScheduler;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// `config/default.toml`, then `config/{TATOR_ENV}.toml`, then `TATOR__*`.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("TATOR_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Tator job server");

    // ── Step 1: Stores + migrations ──────────────────────────────
    let stores = Stores::from_config(&config.database, true).await?;

    // ── Step 2: Shutdown token ───────────────────────────────────
    let shutdown = CancellationToken::new();

    // ── Step 3: Embedded dispatch loop ───────────────────────────
    let dispatcher = if config.scheduler.embedded {
        let scheduler =
            DispatchScheduler::from_config(&config, stores.jobs.clone(), stores.algorithms.clone())
                .await?;
        let token = shutdown.clone();
        tracing::info!("Dispatch loop enabled");
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        tracing::info!("Dispatch loop disabled; run `tator submit-jobs` separately");
        None
    };

    // ── Step 4: HTTP server ──────────────────────────────────────
    let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
    let state = tator_api::build_state(config, &stores).await?;
    let signal_token = shutdown.clone();
    let result = tator_api::serve(state, async move {
        shutdown_signal().await;
        signal_token.cancel();
    })
    .await;

    // ── Step 5: Wait for background tasks ────────────────────────
    shutdown.cancel();
    if let Some(handle) = dispatcher {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Dispatch loop did not stop within the grace period");
        }
    }
    if let Some(pool) = &stores.pool {
        pool.close().await;
    }

    tracing::info!("Tator job server shut down");
    result
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
