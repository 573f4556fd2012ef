//! Worker queue transport configuration.

use serde::{Deserialize, Serialize};

/// Transport used to hand job payloads to worker pods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    /// Transport: `"redis"` or `"memory"`.
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Redis URL for the list-backed transport.
    #[serde(default = "super::cache::default_redis_url")]
    pub redis_url: String,
    /// Prefix prepended to each queue name to form the Redis list key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// How long a worker blocks on an empty queue before polling again.
    #[serde(default = "default_pop_timeout")]
    pub pop_timeout_seconds: u64,
    /// Base URL of the API server workers report job outcomes to. When
    /// unset, the local `server` address is used.
    #[serde(default)]
    pub progress_url: Option<String>,
}

impl Default for WorkerQueueConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            redis_url: super::cache::default_redis_url(),
            key_prefix: default_key_prefix(),
            pop_timeout_seconds: default_pop_timeout(),
            progress_url: None,
        }
    }
}

fn default_transport() -> String {
    "redis".to_string()
}

fn default_key_prefix() -> String {
    "tator:queue:".to_string()
}

fn default_pop_timeout() -> u64 {
    5
}
