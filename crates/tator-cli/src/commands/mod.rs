//! CLI command definitions and dispatch.

pub mod algorithm;
pub mod enqueue;
pub mod migrate;
pub mod serve;
pub mod status;
pub mod submit_jobs;
pub mod worker;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_database::Stores;

use crate::output::OutputFormat;

/// Tator job admission, dispatch, and progress
#[derive(Debug, Parser)]
#[command(name = "tator", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TATOR_CONFIG", default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP API and progress stream
    Serve(serve::ServeArgs),
    /// Run the dispatch loop
    SubmitJobs(submit_jobs::SubmitJobsArgs),
    /// Pull and run jobs for one channel
    Worker(worker::WorkerArgs),
    /// Show job counts and queue depth per channel
    Status,
    /// Apply pending database migrations
    Migrate,
    /// Add a job to the queue
    Enqueue(enqueue::EnqueueArgs),
    /// Algorithm registry
    Algorithm(algorithm::AlgorithmArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config)?;
        match &self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::SubmitJobs(args) => submit_jobs::execute(args, config, self.format).await,
            Commands::Worker(args) => worker::execute(args, config).await,
            Commands::Status => status::execute(config, self.format).await,
            Commands::Migrate => migrate::execute(config).await,
            Commands::Enqueue(args) => enqueue::execute(args, config, self.format).await,
            Commands::Algorithm(args) => algorithm::execute(args, config, self.format).await,
        }
    }
}

/// Load configuration from `path` plus `TATOR__*` environment overrides.
pub fn load_config(path: &str) -> Result<AppConfig, AppError> {
    let path = path.strip_suffix(".toml").unwrap_or(path);
    AppConfig::from_file(path)
}

/// Open the configured stores without touching the schema.
pub async fn open_stores(config: &AppConfig) -> Result<Stores, AppError> {
    Stores::from_config(&config.database, false).await
}

/// A token cancelled on Ctrl+C or SIGTERM.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        trigger.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worker_arguments() {
        let cli = Cli::parse_from([
            "tator",
            "--format",
            "json",
            "worker",
            "--channel",
            "transcode",
            "--pod-name",
            "transcode-worker-0",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Worker(args) => {
                assert_eq!(args.channel, tator_entity::job::JobChannel::Transcode);
                assert_eq!(args.pod_name, "transcode-worker-0");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_channel() {
        let parsed = Cli::try_parse_from(["tator", "enqueue", "--channel", "render"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_config("does/not/exist.toml").unwrap();
        assert_eq!(config.scheduler.channel_interval_ms, 300);
    }
}
