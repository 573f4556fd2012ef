//! Progress pub/sub and WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// Real-time progress fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each in-process broadcast group.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Pub/sub transport: `"memory"` (single process) or `"redis"` (relay
    /// broadcasts between API replicas).
    #[serde(default = "default_pubsub")]
    pub pubsub: String,
    /// Redis URL for the pub/sub relay.
    #[serde(default = "super::cache::default_redis_url")]
    pub redis_url: String,
    /// Prefix of the Redis pub/sub channel names.
    #[serde(default = "default_channel_prefix")]
    pub redis_channel_prefix: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer(),
            outbound_buffer_size: default_outbound_buffer(),
            pubsub: default_pubsub(),
            redis_url: super::cache::default_redis_url(),
            redis_channel_prefix: default_channel_prefix(),
        }
    }
}

fn default_channel_buffer() -> usize {
    256
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_pubsub() -> String {
    "memory".to_string()
}

fn default_channel_prefix() -> String {
    "tator:progress:".to_string()
}
