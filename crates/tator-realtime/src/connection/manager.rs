//! Connection manager: registration and teardown of client connections.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use tator_core::types::UserId;

use crate::channel::registry::SubscriptionRegistry;
use crate::metrics::RealtimeMetrics;

use super::handle::{ConnectionHandle, ConnectionId};

/// Tracks every open client connection.
#[derive(Debug)]
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    subscriptions: Arc<SubscriptionRegistry>,
    metrics: Arc<RealtimeMetrics>,
    outbound_buffer: usize,
}

impl ConnectionManager {
    /// Create a manager whose connections buffer `outbound_buffer`
    /// messages each.
    pub fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        metrics: Arc<RealtimeMetrics>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions,
            metrics,
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    /// Register a connection for `user_id`.
    ///
    /// Returns the handle and the receiver the transport drains.
    pub fn register(&self, user_id: UserId) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let handle = Arc::new(ConnectionHandle::new(user_id, tx));
        self.connections.insert(handle.id, handle.clone());
        self.metrics.connection_opened();

        info!(conn_id = %handle.id, user_id = %user_id, "Progress connection registered");
        (handle, rx)
    }

    /// Close a connection and drop all of its group memberships.
    /// Unregistering twice is a no-op.
    pub fn unregister(&self, conn_id: &ConnectionId) -> Vec<String> {
        let Some((_, handle)) = self.connections.remove(conn_id) else {
            return Vec::new();
        };
        handle.mark_closed();
        let left = self.subscriptions.leave_all(*conn_id);
        self.metrics.connection_closed();

        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            groups = left.len(),
            "Progress connection unregistered"
        );
        left
    }

    /// Look up a connection.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(conn_id).map(|h| h.clone())
    }

    /// Mark every connection closed and forget it.
    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| *e.key()).collect();
        for id in &ids {
            self.unregister(id);
        }
        ids.len()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
