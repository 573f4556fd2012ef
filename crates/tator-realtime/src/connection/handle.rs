//! Individual client connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use tator_core::types::UserId;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// The sending half of one client connection.
///
/// Messages pushed here are drained by the transport task (the WebSocket
/// writer) in order.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Identity the connection was opened for.
    pub user_id: UserId,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a handle around the outbound queue.
    pub fn new(user_id: UserId, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            connected_at: Utc::now(),
            sender,
            alive: AtomicBool::new(true),
        }
    }

    /// Queue a message, waiting for room. Returns `false` once the
    /// connection is closed.
    pub async fn deliver(&self, msg: String) -> bool {
        if !self.is_alive() {
            return false;
        }
        if self.sender.send(msg).await.is_err() {
            self.mark_closed();
            return false;
        }
        true
    }

    /// Whether the connection still accepts messages.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.sender.is_closed()
    }

    /// Stop accepting messages.
    pub fn mark_closed(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
