//! Redis list transport: `RPUSH` to send, `BLPOP` to receive.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;

use super::WorkerQueue;

/// Worker queues stored as Redis lists under `{key_prefix}{queue}`.
#[derive(Clone)]
pub struct RedisWorkerQueue {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisWorkerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWorkerQueue")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

fn queue_error(context: &'static str) -> impl FnOnce(redis::RedisError) -> AppError {
    move |e| AppError::with_source(ErrorKind::Queue, context, e)
}

impl RedisWorkerQueue {
    /// Connect to `url`.
    pub async fn connect(url: &str, key_prefix: &str) -> AppResult<Self> {
        let client = redis::Client::open(url).map_err(queue_error("Invalid worker queue URL"))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(queue_error("Failed to connect to worker queue"))?;
        info!(key_prefix, "Redis worker queue connected");
        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Redis key of `queue`.
    pub fn list_key(&self, queue: &str) -> String {
        format!("{}{queue}", self.key_prefix)
    }
}

#[async_trait]
impl WorkerQueue for RedisWorkerQueue {
    async fn send(&self, queue: &str, payload: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("RPUSH")
            .arg(self.list_key(queue))
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(queue_error("RPUSH failed"))?;
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(self.list_key(queue))
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(queue_error("BLPOP failed"))?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn len(&self, queue: &str) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        redis::cmd("LLEN")
            .arg(self.list_key(queue))
            .query_async::<u64>(&mut conn)
            .await
            .map_err(queue_error("LLEN failed"))
    }
}
