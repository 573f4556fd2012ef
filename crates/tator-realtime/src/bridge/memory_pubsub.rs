//! In-process broadcast groups.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use tator_core::result::AppResult;

use super::ProgressPublisher;

/// Named broadcast groups carrying serialized progress messages.
#[derive(Debug)]
pub struct MemoryPubSub {
    groups: RwLock<HashMap<String, broadcast::Sender<String>>>,
    buffer_size: usize,
}

impl MemoryPubSub {
    /// Create an empty set of groups; each group buffers `buffer_size`
    /// messages per lagging subscriber.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Deliver `payload` to the current subscribers of `group`. Returns
    /// how many subscribers received it.
    pub async fn send(&self, group: &str, payload: String) -> usize {
        let groups = self.groups.read().await;
        match groups.get(group) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Join `group`, creating it on first use.
    pub async fn subscribe(&self, group: &str) -> broadcast::Receiver<String> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Current subscriber count of `group`.
    pub async fn subscriber_count(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop groups nobody listens to any more.
    pub async fn prune(&self) -> usize {
        let mut groups = self.groups.write().await;
        let before = groups.len();
        groups.retain(|_, tx| tx.receiver_count() > 0);
        before - groups.len()
    }

    /// Number of live groups.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

#[async_trait]
impl ProgressPublisher for MemoryPubSub {
    async fn publish(&self, group: &str, payload: &str) -> AppResult<()> {
        let delivered = self.send(group, payload.to_string()).await;
        trace!(group, delivered, "Published progress message");
        Ok(())
    }
}
