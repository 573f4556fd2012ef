//! Redis connection management.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use tator_core::config::cache::RedisCacheConfig;
use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;

/// Reconnecting Redis connection plus the configured key prefix.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect using the cache configuration.
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        info!(url = %redact_redis_url(&config.url), "Connecting to Redis cache");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to create Redis client", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
        })?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// A handle to the shared connection.
    pub fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Apply the configured prefix to `key`.
    pub fn prefixed_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

/// Hide the password of a Redis URL for logging.
pub fn redact_redis_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|p| p + 3) else {
        return url.to_string();
    };
    match url[scheme_end..].rfind('@').map(|p| p + scheme_end) {
        Some(at) => format!("{}****{}", &url[..scheme_end], &url[at..]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_redis_url() {
        assert_eq!(
            redact_redis_url("redis://:secret@cache:6379/0"),
            "redis://****@cache:6379/0"
        );
        assert_eq!(
            redact_redis_url("redis://cache:6379"),
            "redis://cache:6379"
        );
    }
}
