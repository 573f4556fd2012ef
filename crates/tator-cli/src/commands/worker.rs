//! Worker pod loop.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_entity::job::JobChannel;
use tator_worker::executor::CommandHandler;
use tator_worker::queue::build_worker_queue;
use tator_worker::{
    HttpProgressReporter, JobExecutor, SystemClock, WorkerQueueRegistry, WorkerRunner,
};

/// Arguments for the worker command
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Channel whose queue this worker pops
    #[arg(long)]
    pub channel: JobChannel,

    /// Name recorded on claimed jobs; must match the pod name the cluster
    /// API reports
    #[arg(long, env = "POD_NAME")]
    pub pod_name: String,

    /// API server that receives job outcome reports; overrides
    /// `worker_queue.progress_url`
    #[arg(long, env = "TATOR_PROGRESS_URL")]
    pub progress_url: Option<String>,
}

/// Where outcome reports go: the flag, then config, then the local server.
fn progress_base_url(args: &WorkerArgs, config: &AppConfig) -> String {
    if let Some(url) = args.progress_url.as_ref().or(config.worker_queue.progress_url.as_ref()) {
        return url.clone();
    }
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!("http://{host}:{}", config.server.port)
}

/// Execute the worker command
pub async fn execute(args: &WorkerArgs, config: AppConfig) -> Result<(), AppError> {
    crate::init_logging(&config.logging);

    let stores = super::open_stores(&config).await?;
    let transport = build_worker_queue(&config.worker_queue).await?;
    let registry = WorkerQueueRegistry::from_config(&config.scheduler, transport);
    let route = registry.route(args.channel)?.clone();

    let progress_url = progress_base_url(args, &config);
    let reporter = HttpProgressReporter::new(&progress_url, Duration::from_secs(10))?;
    tracing::info!(progress_url = %progress_url, "Reporting job outcomes");

    let mut executor = JobExecutor::new();
    executor.register(Arc::new(CommandHandler::new(args.channel)));

    let runner = WorkerRunner::new(
        args.channel,
        args.pod_name.clone(),
        route,
        stores.jobs.clone(),
        Arc::new(executor),
        Arc::new(SystemClock),
    )
    .with_pop_timeout(Duration::from_secs(config.worker_queue.pop_timeout_seconds.max(1)))
    .with_progress_reporter(Arc::new(reporter));

    runner.run(super::shutdown_token()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(progress_url: Option<&str>) -> WorkerArgs {
        WorkerArgs {
            channel: JobChannel::Algorithm,
            pod_name: "algo-1".to_string(),
            progress_url: progress_url.map(str::to_string),
        }
    }

    #[test]
    fn progress_url_defaults_to_local_server() {
        let mut config = AppConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 9000;
        assert_eq!(progress_base_url(&args(None), &config), "http://127.0.0.1:9000");
    }

    #[test]
    fn progress_url_flag_beats_config() {
        let mut config = AppConfig::default();
        config.worker_queue.progress_url = Some("http://api:8080".to_string());
        assert_eq!(progress_base_url(&args(None), &config), "http://api:8080");
        assert_eq!(
            progress_base_url(&args(Some("http://other:1")), &config),
            "http://other:1"
        );
    }
}
