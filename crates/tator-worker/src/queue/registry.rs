//! Channel to queue routing.

use std::collections::HashMap;
use std::sync::Arc;

use tator_core::config::scheduler::SchedulerConfig;
use tator_core::error::AppError;
use tator_core::result::AppResult;
use tator_entity::job::JobChannel;

use super::WorkerQueue;

/// Where one channel's payloads are sent.
#[derive(Debug, Clone)]
pub struct QueueRoute {
    /// Queue name on the transport.
    pub queue: String,
    /// Transport holding the queue.
    pub transport: Arc<dyn WorkerQueue>,
}

impl QueueRoute {
    /// Send `payload` down this route.
    pub async fn send(&self, payload: &str) -> AppResult<()> {
        self.transport.send(&self.queue, payload).await
    }
}

/// Lookup table from [`JobChannel`] to its worker queue.
#[derive(Debug, Clone, Default)]
pub struct WorkerQueueRegistry {
    routes: HashMap<JobChannel, QueueRoute>,
}

impl WorkerQueueRegistry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every channel through `transport` using the queue names from
    /// the scheduler settings.
    pub fn from_config(config: &SchedulerConfig, transport: Arc<dyn WorkerQueue>) -> Self {
        let mut registry = Self::new();
        for channel in JobChannel::ALL {
            let routing = match channel {
                JobChannel::Algorithm => &config.algorithm,
                JobChannel::Transcode => &config.transcode,
                JobChannel::Package => &config.package,
            };
            registry.register(channel, &routing.queue, transport.clone());
        }
        registry
    }

    /// Route `channel` to `queue` on `transport`, replacing any previous route.
    pub fn register(&mut self, channel: JobChannel, queue: &str, transport: Arc<dyn WorkerQueue>) {
        self.routes.insert(
            channel,
            QueueRoute {
                queue: queue.to_string(),
                transport,
            },
        );
    }

    /// The route for `channel`.
    pub fn route(&self, channel: JobChannel) -> AppResult<&QueueRoute> {
        self.routes.get(&channel).ok_or_else(|| {
            AppError::configuration(format!("No worker queue registered for channel '{channel}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryWorkerQueue;
    use std::time::Duration;

    #[tokio::test]
    async fn routes_follow_scheduler_config() {
        let transport = Arc::new(MemoryWorkerQueue::new());
        let mut config = SchedulerConfig::default();
        config.transcode.queue = "media".to_string();
        let registry = WorkerQueueRegistry::from_config(&config, transport.clone());

        registry
            .route(JobChannel::Transcode)
            .unwrap()
            .send("{}")
            .await
            .unwrap();
        let popped = transport.pop("media", Duration::from_millis(10)).await.unwrap();
        assert_eq!(popped.as_deref(), Some("{}"));
        assert_eq!(registry.route(JobChannel::Algorithm).unwrap().queue, "algorithm");
    }

    #[test]
    fn missing_route_is_configuration_error() {
        let registry = WorkerQueueRegistry::new();
        let err = registry.route(JobChannel::Package).unwrap_err();
        assert_eq!(err.kind, tator_core::error::ErrorKind::Configuration);
    }
}
