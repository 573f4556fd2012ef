//! Transports that carry progress broadcasts to subscribers.
//!
//! Subscribers always listen on the in-process [`MemoryPubSub`]. Producers
//! publish through a [`ProgressPublisher`], which either feeds the local
//! groups directly or relays through Redis so that every API replica's
//! local groups receive the message.

pub mod memory_pubsub;
pub mod redis_pubsub;

use async_trait::async_trait;

use tator_core::result::AppResult;

pub use memory_pubsub::MemoryPubSub;
pub use redis_pubsub::RedisPubSubBridge;

/// Publish side of a progress group transport.
#[async_trait]
pub trait ProgressPublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Send `payload` to every subscriber of `group`.
    async fn publish(&self, group: &str, payload: &str) -> AppResult<()>;
}
