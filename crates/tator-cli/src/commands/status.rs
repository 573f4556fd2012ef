//! Job counts and queue depth per channel.

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_entity::job::{JobChannel, JobStatus};
use tator_worker::{WorkerQueue, WorkerQueueRegistry};
use tator_worker::queue::build_worker_queue;

use crate::output::{self, ChannelStatusRow, OutputFormat};

/// Execute the status command
pub async fn execute(config: AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let stores = super::open_stores(&config).await?;
    let registry = match build_worker_queue(&config.worker_queue).await {
        Ok(transport) => Some(WorkerQueueRegistry::from_config(&config.scheduler, transport)),
        Err(e) => {
            eprintln!("Worker queue unavailable: {e}");
            None
        }
    };

    let mut rows = Vec::with_capacity(JobChannel::ALL.len());
    for channel in JobChannel::ALL {
        let queued = stores.jobs.count(channel, JobStatus::Queued).await?;
        let started = stores.jobs.count(channel, JobStatus::Started).await?;
        let queue_depth = match &registry {
            Some(registry) => {
                let route = registry.route(channel)?;
                route.transport.len(&route.queue).await?.to_string()
            }
            None => "?".to_string(),
        };
        rows.push(ChannelStatusRow {
            channel: channel.to_string(),
            queued,
            started,
            queue_depth,
        });
    }

    output::print_list(&rows, format);
    Ok(())
}
