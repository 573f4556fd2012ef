//! Redis cache provider implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_core::traits::cache::CacheProvider;

use super::client::RedisClient;

/// Redis-backed [`CacheProvider`].
#[derive(Debug, Clone)]
pub struct RedisCacheProvider {
    client: RedisClient,
}

impl RedisCacheProvider {
    /// Wrap a connected client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.client.conn();
        conn.get(self.client.prefixed_key(key))
            .await
            .map_err(Self::map_err)
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.client.conn();
        conn.set::<_, _, ()>(self.client.prefixed_key(key), value)
            .await
            .map_err(Self::map_err)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let removed: u64 = conn
            .del(self.client.prefixed_key(key))
            .await
            .map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.client.conn();
        conn.exists(self.client.prefixed_key(key))
            .await
            .map_err(Self::map_err)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> AppResult<()> {
        let mut conn = self.client.conn();
        conn.hset::<_, _, _, ()>(self.client.prefixed_key(key), field, value)
            .await
            .map_err(Self::map_err)
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        let mut conn = self.client.conn();
        conn.hget(self.client.prefixed_key(key), field)
            .await
            .map_err(Self::map_err)
    }

    async fn hgetall(&self, key: &str) -> AppResult<Vec<(String, String)>> {
        let mut conn = self.client.conn();
        let fields: HashMap<String, String> = conn
            .hgetall(self.client.prefixed_key(key))
            .await
            .map_err(Self::map_err)?;
        Ok(fields.into_iter().collect())
    }

    async fn hdel(&self, key: &str, field: &str) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let removed: u64 = conn
            .hdel(self.client.prefixed_key(key), field)
            .await
            .map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let added: u64 = conn
            .sadd(self.client.prefixed_key(key), member)
            .await
            .map_err(Self::map_err)?;
        Ok(added > 0)
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.client.conn();
        conn.scard(self.client.prefixed_key(key))
            .await
            .map_err(Self::map_err)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
