//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    messages_published: AtomicU64,
    messages_delivered: AtomicU64,
    messages_replayed: AtomicU64,
    messages_lagged: AtomicU64,
}

impl RealtimeMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection.
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disconnection.
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a broadcast issued by a producer.
    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a live message handed to a client.
    pub fn message_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record latest-state entries sent on join.
    pub fn messages_replayed(&self, count: u64) {
        self.messages_replayed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record broadcasts a slow subscriber skipped.
    pub fn messages_lagged(&self, count: u64) {
        self.messages_lagged.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_replayed: self.messages_replayed.load(Ordering::Relaxed),
            messages_lagged: self.messages_lagged.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections ever opened.
    pub connections_total: u64,
    /// Connections currently open.
    pub connections_active: u64,
    /// Broadcasts issued by producers in this process.
    pub messages_published: u64,
    /// Live messages handed to clients.
    pub messages_delivered: u64,
    /// Latest-state entries replayed on join.
    pub messages_replayed: u64,
    /// Broadcasts skipped by lagging subscribers.
    pub messages_lagged: u64,
}
