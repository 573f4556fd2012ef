//! Add a job to the queue.

use clap::Args;

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_entity::job::{CreateJob, JobChannel};

use crate::output::{self, JobRow, OutputFormat};

/// Arguments for the enqueue command
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Target channel
    #[arg(long)]
    pub channel: JobChannel,

    /// Worker parameters as a JSON object
    #[arg(long, default_value = "{}")]
    pub message: String,
}

/// Execute the enqueue command
pub async fn execute(
    args: &EnqueueArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let message: serde_json::Value = serde_json::from_str(&args.message)
        .map_err(|e| AppError::validation(format!("Invalid JSON message: {e}")))?;
    if !message.is_object() {
        return Err(AppError::validation("Message must be a JSON object"));
    }

    let stores = super::open_stores(&config).await?;
    let job = stores
        .jobs
        .create(&CreateJob {
            channel: args.channel,
            message,
        })
        .await?;

    output::print_item(&JobRow::from(&job), format);
    Ok(())
}
