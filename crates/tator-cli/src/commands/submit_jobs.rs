//! The dispatch loop.

use clap::Args;

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_worker::DispatchScheduler;

use crate::output::{self, OutputFormat, ReportRow};

/// Arguments for the submit-jobs command
#[derive(Debug, Args)]
pub struct SubmitJobsArgs {
    /// Run a single pass over every channel, print what it did, and exit
    #[arg(long)]
    pub once: bool,
}

/// Execute the submit-jobs command
pub async fn execute(
    args: &SubmitJobsArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    crate::init_logging(&config.logging);

    let stores = super::open_stores(&config).await?;
    let scheduler =
        DispatchScheduler::from_config(&config, stores.jobs.clone(), stores.algorithms.clone())
            .await?;

    if args.once {
        let reports = scheduler.run_iteration().await;
        let rows: Vec<ReportRow> = reports.iter().map(ReportRow::from).collect();
        output::print_list(&rows, format);
        return Ok(());
    }

    scheduler.run(super::shutdown_token()).await;
    Ok(())
}
