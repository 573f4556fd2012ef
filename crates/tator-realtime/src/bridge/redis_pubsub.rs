//! Redis pub/sub relay for multi-replica deployments.

#[cfg(feature = "redis-pubsub")]
pub mod implementation {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use redis::aio::ConnectionManager;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;
    use tracing::{debug, error, info, warn};

    use tator_core::error::{AppError, ErrorKind};
    use tator_core::result::AppResult;

    use crate::bridge::{MemoryPubSub, ProgressPublisher};

    /// Publishes progress groups as Redis channels and relays every
    /// matching Redis message into the local groups.
    #[derive(Clone)]
    pub struct RedisPubSubBridge {
        client: redis::Client,
        conn: ConnectionManager,
        channel_prefix: String,
    }

    impl std::fmt::Debug for RedisPubSubBridge {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisPubSubBridge")
                .field("channel_prefix", &self.channel_prefix)
                .finish_non_exhaustive()
        }
    }

    fn map_err(context: &'static str) -> impl FnOnce(redis::RedisError) -> AppError {
        move |e| AppError::with_source(ErrorKind::Cache, context, e)
    }

    impl RedisPubSubBridge {
        /// Connect the publishing side.
        pub async fn connect(url: &str, channel_prefix: &str) -> AppResult<Self> {
            let client =
                redis::Client::open(url).map_err(map_err("Failed to create Redis client"))?;
            let conn = ConnectionManager::new(client.clone())
                .await
                .map_err(map_err("Failed to connect to Redis"))?;
            info!(prefix = %channel_prefix, "Redis progress relay connected");
            Ok(Self {
                client,
                conn,
                channel_prefix: channel_prefix.to_string(),
            })
        }

        /// Redis channel carrying `group`.
        pub fn channel_for(&self, group: &str) -> String {
            format!("{}{group}", self.channel_prefix)
        }

        /// Forward every relayed message into `local` until `shutdown`
        /// fires or the subscription ends.
        pub async fn spawn_relay(
            &self,
            local: Arc<MemoryPubSub>,
            mut shutdown: broadcast::Receiver<()>,
        ) -> AppResult<JoinHandle<()>> {
            let mut pubsub = self
                .client
                .get_async_pubsub()
                .await
                .map_err(map_err("Failed to open Redis subscription"))?;
            let pattern = format!("{}*", self.channel_prefix);
            pubsub
                .psubscribe(&pattern)
                .await
                .map_err(map_err("Failed to subscribe to progress channels"))?;

            let prefix = self.channel_prefix.clone();
            Ok(tokio::spawn(async move {
                let mut messages = pubsub.into_on_message();
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => {
                            debug!("Redis progress relay stopping");
                            break;
                        }
                        next = messages.next() => {
                            let Some(msg) = next else {
                                warn!("Redis progress subscription ended");
                                break;
                            };
                            let Some(group) = msg.get_channel_name().strip_prefix(prefix.as_str())
                            else {
                                continue;
                            };
                            match msg.get_payload::<String>() {
                                Ok(payload) => {
                                    local.send(group, payload).await;
                                }
                                Err(e) => error!(error = %e, group, "Undecodable relayed message"),
                            }
                        }
                    }
                }
            }))
        }
    }

    #[async_trait]
    impl ProgressPublisher for RedisPubSubBridge {
        async fn publish(&self, group: &str, payload: &str) -> AppResult<()> {
            let mut conn = self.conn.clone();
            redis::cmd("PUBLISH")
                .arg(self.channel_for(group))
                .arg(payload)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(map_err("Redis PUBLISH failed"))?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "redis-pubsub"))]
pub mod implementation {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;

    use tator_core::error::AppError;
    use tator_core::result::AppResult;

    use crate::bridge::{MemoryPubSub, ProgressPublisher};

    fn disabled() -> AppError {
        AppError::configuration("Redis pub/sub relay requires the `redis-pubsub` feature")
    }

    /// Placeholder used when the `redis-pubsub` feature is disabled.
    #[derive(Debug, Clone)]
    pub struct RedisPubSubBridge;

    impl RedisPubSubBridge {
        /// Always fails: the relay is not compiled in.
        pub async fn connect(_url: &str, _channel_prefix: &str) -> AppResult<Self> {
            Err(disabled())
        }

        /// Always fails: the relay is not compiled in.
        pub async fn spawn_relay(
            &self,
            _local: Arc<MemoryPubSub>,
            _shutdown: broadcast::Receiver<()>,
        ) -> AppResult<JoinHandle<()>> {
            Err(disabled())
        }
    }

    #[async_trait]
    impl ProgressPublisher for RedisPubSubBridge {
        async fn publish(&self, _group: &str, _payload: &str) -> AppResult<()> {
            Err(disabled())
        }
    }
}

pub use implementation::RedisPubSubBridge;
