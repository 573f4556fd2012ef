//! Start the HTTP API, optionally with the dispatch loop alongside.

use clap::Args;
use tracing::{error, info};

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_database::Stores;
use tator_worker::DispatchScheduler;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the server host
    #[arg(long)]
    pub host: Option<String>,

    /// Skip database migrations on startup
    #[arg(long)]
    pub no_migrate: bool,

    /// Also run the dispatch loop in this process
    #[arg(long)]
    pub dispatch: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<(), AppError> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    crate::init_logging(&config.logging);

    let stores = Stores::from_config(&config.database, !args.no_migrate).await?;
    let shutdown = super::shutdown_token();

    let dispatcher = if args.dispatch {
        let scheduler =
            DispatchScheduler::from_config(&config, stores.jobs.clone(), stores.algorithms.clone())
                .await?;
        let token = shutdown.clone();
        info!("Starting dispatch loop alongside the API");
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        None
    };

    let state = tator_api::build_state(config, &stores).await?;
    let server_shutdown = shutdown.clone();
    let result = tator_api::serve(state, async move { server_shutdown.cancelled().await }).await;

    shutdown.cancel();
    if let Some(handle) = dispatcher {
        if let Err(e) = handle.await {
            error!(error = %e, "Dispatch loop task failed");
        }
    }
    if let Some(pool) = &stores.pool {
        pool.close().await;
    }
    result
}
