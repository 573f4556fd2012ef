//! Top-level realtime engine that ties the progress subsystems together.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use tator_cache::CacheManager;
use tator_core::config::realtime::RealtimeConfig;
use tator_core::error::AppError;
use tator_core::types::UserId;
use tator_database::store::MembershipStore;
use tator_entity::progress::ProgressHeader;

use crate::bridge::{MemoryPubSub, ProgressPublisher, RedisPubSubBridge};
use crate::channel::registry::SubscriptionRegistry;
use crate::connection::manager::ConnectionManager;
use crate::consumer::{ConsumerContext, ProgressConsumer};
use crate::metrics::RealtimeMetrics;
use crate::producer::ProgressProducer;

/// Owns the pub/sub groups, connections, and the publisher producers use.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Local broadcast groups every consumer listens on.
    pub bus: Arc<MemoryPubSub>,
    /// Open connections.
    pub connections: Arc<ConnectionManager>,
    /// Group membership index.
    pub subscriptions: Arc<SubscriptionRegistry>,
    /// Counters.
    pub metrics: Arc<RealtimeMetrics>,
    publisher: Arc<dyn ProgressPublisher>,
    cache: CacheManager,
    memberships: Arc<dyn MembershipStore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl RealtimeEngine {
    /// Build a single-process engine: producers publish straight into the
    /// local groups.
    pub fn new(
        config: &RealtimeConfig,
        cache: CacheManager,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        let bus = Arc::new(MemoryPubSub::new(config.channel_buffer_size));
        Self::assemble(config, bus.clone(), bus, cache, memberships)
    }

    /// Build the engine the configuration asks for. With `pubsub = "redis"`
    /// producers publish through Redis and a relay task feeds the local
    /// groups, so every replica sees every broadcast.
    pub async fn from_config(
        config: &RealtimeConfig,
        cache: CacheManager,
        memberships: Arc<dyn MembershipStore>,
    ) -> Result<Self, AppError> {
        match config.pubsub.as_str() {
            "memory" => Ok(Self::new(config, cache, memberships)),
            "redis" => {
                let bus = Arc::new(MemoryPubSub::new(config.channel_buffer_size));
                let bridge =
                    RedisPubSubBridge::connect(&config.redis_url, &config.redis_channel_prefix)
                        .await?;
                let engine =
                    Self::assemble(config, bus.clone(), Arc::new(bridge.clone()), cache, memberships);
                bridge
                    .spawn_relay(bus, engine.shutdown_tx.subscribe())
                    .await?;
                Ok(engine)
            }
            other => Err(AppError::configuration(format!(
                "Unknown realtime pubsub transport: '{other}'. Supported: memory, redis"
            ))),
        }
    }

    fn assemble(
        config: &RealtimeConfig,
        bus: Arc<MemoryPubSub>,
        publisher: Arc<dyn ProgressPublisher>,
        cache: CacheManager,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let metrics = Arc::new(RealtimeMetrics::new());
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let connections = Arc::new(ConnectionManager::new(
            subscriptions.clone(),
            metrics.clone(),
            config.outbound_buffer_size,
        ));

        info!(pubsub = %config.pubsub, "Realtime engine initialized");

        Self {
            bus,
            connections,
            subscriptions,
            metrics,
            publisher,
            cache,
            memberships,
            shutdown_tx,
        }
    }

    /// A producer for the job described by `header`.
    pub fn producer(&self, header: ProgressHeader) -> ProgressProducer {
        ProgressProducer::new(self.cache.clone(), self.publisher.clone(), header)
            .with_metrics(self.metrics.clone())
    }

    /// Register a connection for `user_id`. The returned receiver yields
    /// every message for the client; call [`ProgressConsumer::join`] once
    /// something drains it.
    pub fn open(&self, user_id: UserId) -> (ProgressConsumer, tokio::sync::mpsc::Receiver<String>) {
        let (handle, rx) = self.connections.register(user_id);
        let ctx = ConsumerContext {
            cache: self.cache.clone(),
            bus: self.bus.clone(),
            memberships: self.memberships.clone(),
            connections: self.connections.clone(),
            subscriptions: self.subscriptions.clone(),
            metrics: self.metrics.clone(),
        };
        (ProgressConsumer::new(ctx, handle), rx)
    }

    /// A receiver that fires when the engine shuts down.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Stop the relay and close every connection.
    pub async fn shutdown(&self) {
        info!("Shutting down realtime engine");
        let _ = self.shutdown_tx.send(());
        let closed = self.connections.close_all();
        self.bus.prune().await;
        info!(closed, "Realtime engine shut down");
    }
}
