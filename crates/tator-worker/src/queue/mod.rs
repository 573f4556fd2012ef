//! Named queues that carry dispatched job payloads to worker pods.

pub mod memory;
pub mod redis_list;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tator_core::config::queue::WorkerQueueConfig;
use tator_core::error::AppError;
use tator_core::result::AppResult;

pub use memory::MemoryWorkerQueue;
pub use redis_list::RedisWorkerQueue;
pub use registry::WorkerQueueRegistry;

/// A transport holding any number of named FIFO queues.
#[async_trait]
pub trait WorkerQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Append `payload` to `queue`.
    async fn send(&self, queue: &str, payload: &str) -> AppResult<()>;

    /// Take the oldest payload of `queue`, waiting up to `timeout` for one.
    async fn pop(&self, queue: &str, timeout: Duration) -> AppResult<Option<String>>;

    /// Number of payloads waiting in `queue`.
    async fn len(&self, queue: &str) -> AppResult<u64>;
}

/// Build the transport named by `config.transport`.
pub async fn build_worker_queue(config: &WorkerQueueConfig) -> AppResult<Arc<dyn WorkerQueue>> {
    match config.transport.as_str() {
        "memory" => Ok(Arc::new(MemoryWorkerQueue::new())),
        "redis" => Ok(Arc::new(
            RedisWorkerQueue::connect(&config.redis_url, &config.key_prefix).await?,
        )),
        other => Err(AppError::configuration(format!(
            "Unknown worker queue transport: '{other}'. Supported: redis, memory"
        ))),
    }
}
