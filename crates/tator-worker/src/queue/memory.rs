//! In-process worker queues.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

use tator_core::result::AppResult;

use super::WorkerQueue;

/// Worker queues living in this process. Useful for single-host runs
/// and tests.
#[derive(Debug, Default)]
pub struct MemoryWorkerQueue {
    queues: DashMap<String, VecDeque<String>>,
    notify: Notify,
}

impl MemoryWorkerQueue {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn try_pop(&self, queue: &str) -> Option<String> {
        self.queues.get_mut(queue)?.pop_front()
    }

    /// Snapshot of `queue` without consuming it.
    pub fn peek_all(&self, queue: &str) -> Vec<String> {
        self.queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkerQueue for MemoryWorkerQueue {
    async fn send(&self, queue: &str, payload: &str) -> AppResult<()> {
        self.queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> AppResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(payload) = self.try_pop(queue) {
                return Ok(Some(payload));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.try_pop(queue));
            }
        }
    }

    async fn len(&self, queue: &str) -> AppResult<u64> {
        Ok(self.queues.get(queue).map(|q| q.len() as u64).unwrap_or(0))
    }
}
