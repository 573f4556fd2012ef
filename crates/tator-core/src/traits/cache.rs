//! Cache provider trait for pluggable shared key/value backends.

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for the shared key/value cache (Redis or in-memory).
///
/// Entries never expire on their own; every key is removed by an explicit
/// delete. Plain values, hashes, and sets live in separate namespaces of the
/// same key space, mirroring Redis semantics. The provider is responsible
/// for key prefixing.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Get a plain value by key.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a plain value.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Delete a key of any type. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Check whether a key of any type exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Set a single field of a hash.
    async fn hset(&self, key: &str, field: &str, value: &str) -> AppResult<()>;

    /// Get a single field of a hash.
    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>>;

    /// Get every field of a hash as `(field, value)` pairs.
    async fn hgetall(&self, key: &str) -> AppResult<Vec<(String, String)>>;

    /// Delete a field of a hash. Returns `true` if the field existed.
    async fn hdel(&self, key: &str, field: &str) -> AppResult<bool>;

    /// Add a member to a set. Returns `true` if the member was new.
    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool>;

    /// Count the members of a set.
    async fn scard(&self, key: &str) -> AppResult<u64>;

    /// Get a typed hash field by deserializing from JSON.
    async fn hget_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
        field: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.hget(key, field).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed hash field by serializing to JSON.
    async fn hset_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.hset(key, field, &json).await
    }

    /// Check that the cache backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
