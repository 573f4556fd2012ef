//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use tator_core::config::cache::CacheConfig;
use tator_core::error::AppError;
use tator_core::result::AppResult;
use tator_core::traits::cache::CacheProvider;

/// Shared handle to the configured cache provider.
///
/// Constructed once at process start and passed to every component that
/// touches progress state.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<dyn CacheProvider>,
}

impl CacheManager {
    /// Create a cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn CacheProvider> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisCacheProvider::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory cache provider");
                Arc::new(crate::memory::MemoryCacheProvider::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a cache manager from an existing provider.
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self { inner: provider }
    }

    /// An in-memory cache manager.
    #[cfg(feature = "memory")]
    pub fn in_memory() -> Self {
        Self::from_provider(Arc::new(crate::memory::MemoryCacheProvider::new()))
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> AppResult<()> {
        self.inner.hset(key, field, value).await
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> AppResult<Vec<(String, String)>> {
        self.inner.hgetall(key).await
    }

    async fn hdel(&self, key: &str, field: &str) -> AppResult<bool> {
        self.inner.hdel(key, field).await
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        self.inner.sadd(key, member).await
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        self.inner.scard(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
