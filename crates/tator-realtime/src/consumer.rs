//! Progress consumer: one subscribed client connection.
//!
//! Lifecycle: `Connecting` -> `Joined` -> `Receiving` -> `Disconnected`.
//! Joining subscribes to every `(prefix, project)` group of the user's
//! projects *before* replaying each group's latest-state hash, so no
//! broadcast can fall between replay and live delivery. A message issued
//! during that window may arrive twice; clients keep the last value per
//! uid.

use std::sync::Arc;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use tator_cache::CacheManager;
use tator_cache::keys;
use tator_core::result::AppResult;
use tator_core::traits::cache::CacheProvider;
use tator_core::types::{ProjectId, UserId};
use tator_database::store::MembershipStore;
use tator_entity::progress::JobType;

use crate::bridge::MemoryPubSub;
use crate::channel::registry::SubscriptionRegistry;
use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::connection::manager::ConnectionManager;
use crate::metrics::RealtimeMetrics;

/// Where a consumer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Registered; nothing joined yet.
    Connecting,
    /// Groups joined; replay in progress.
    Joined,
    /// Replay done; live broadcasts are being forwarded.
    Receiving,
    /// Torn down; nothing more is delivered.
    Disconnected,
}

/// Shared pieces a consumer needs, owned by the engine.
#[derive(Debug, Clone)]
pub struct ConsumerContext {
    pub(crate) cache: CacheManager,
    pub(crate) bus: Arc<MemoryPubSub>,
    pub(crate) memberships: Arc<dyn MembershipStore>,
    pub(crate) connections: Arc<ConnectionManager>,
    pub(crate) subscriptions: Arc<SubscriptionRegistry>,
    pub(crate) metrics: Arc<RealtimeMetrics>,
}

/// One client connection subscribed to progress updates.
pub struct ProgressConsumer {
    ctx: ConsumerContext,
    handle: Arc<ConnectionHandle>,
    forwarders: JoinSet<()>,
    groups: Vec<String>,
    state: ConsumerState,
}

impl std::fmt::Debug for ProgressConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressConsumer")
            .field("conn_id", &self.handle.id)
            .field("user_id", &self.handle.user_id)
            .field("groups", &self.groups)
            .field("state", &self.state)
            .finish()
    }
}

impl ProgressConsumer {
    pub(crate) fn new(ctx: ConsumerContext, handle: Arc<ConnectionHandle>) -> Self {
        Self {
            ctx,
            handle,
            forwarders: JoinSet::new(),
            groups: Vec::new(),
            state: ConsumerState::Connecting,
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    /// Identity the connection belongs to.
    pub fn user_id(&self) -> UserId {
        self.handle.user_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Groups joined, in join order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Join every group of the user's projects, replay their latest
    /// state, then start forwarding live broadcasts.
    ///
    /// The transport must already be draining the connection's receiver;
    /// replay waits for room in the outbound queue.
    pub async fn join(&mut self) -> AppResult<()> {
        if self.state != ConsumerState::Connecting {
            return Ok(());
        }
        let projects = self
            .ctx
            .memberships
            .projects_for_user(self.handle.user_id)
            .await?;

        let mut pending: Vec<(JobType, ProjectId, Receiver<String>)> = Vec::new();
        for project in &projects {
            for prefix in JobType::ALL {
                let group = keys::group(prefix, *project);
                let rx = self.ctx.bus.subscribe(&group).await;
                self.ctx.subscriptions.join(&group, self.handle.id);
                self.groups.push(group);
                pending.push((prefix, *project, rx));
            }
        }
        self.state = ConsumerState::Joined;

        let mut replayed = 0u64;
        for (prefix, project, rx) in pending {
            let entries = self.ctx.cache.hgetall(&keys::latest(prefix, project)).await?;
            for (_, payload) in entries {
                if !self.handle.deliver(payload).await {
                    debug!(conn_id = %self.handle.id, "Connection closed during replay");
                    self.disconnect();
                    return Ok(());
                }
                replayed += 1;
            }
            self.spawn_forwarder(keys::group(prefix, project), rx);
        }
        self.ctx.metrics.messages_replayed(replayed);
        self.state = ConsumerState::Receiving;

        info!(
            conn_id = %self.handle.id,
            user_id = %self.handle.user_id,
            projects = projects.len(),
            replayed,
            "Progress consumer joined"
        );
        Ok(())
    }

    fn spawn_forwarder(&mut self, group: String, mut rx: Receiver<String>) {
        let handle = self.handle.clone();
        let metrics = self.ctx.metrics.clone();
        self.forwarders.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        if !handle.deliver(payload).await {
                            break;
                        }
                        metrics.message_delivered();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(conn_id = %handle.id, group = %group, skipped, "Subscriber lagged");
                        metrics.messages_lagged(skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Stop forwarding and leave every group. Nothing is delivered after
    /// this returns. Calling it again is a no-op.
    pub fn disconnect(&mut self) {
        if self.state == ConsumerState::Disconnected {
            return;
        }
        self.handle.mark_closed();
        self.forwarders.abort_all();
        self.ctx.connections.unregister(&self.handle.id);
        self.state = ConsumerState::Disconnected;
    }

    /// Disconnect and drop groups nobody else listens to.
    pub async fn close(mut self) {
        self.disconnect();
        // Aborted forwarders release their receivers once they are reaped.
        while self.forwarders.join_next().await.is_some() {}
        self.ctx.bus.prune().await;
    }
}

impl Drop for ProgressConsumer {
    fn drop(&mut self) {
        self.disconnect();
    }
}
