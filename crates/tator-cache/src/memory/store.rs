//! In-process cache backed by a concurrent map.
//!
//! Mirrors the Redis data model closely enough for the progress producer:
//! each key holds a string, a hash, or a set, type mismatches are errors,
//! and hashes and sets disappear once their last field or member is
//! removed.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;

use tator_core::error::AppError;
use tator_core::result::AppResult;
use tator_core::traits::cache::CacheProvider;

#[derive(Debug, Clone)]
enum Entry {
    Value(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Value(_) => "string",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
        }
    }
}

fn wrong_type(key: &str, found: &Entry, wanted: &str) -> AppError {
    AppError::cache(format!(
        "WRONGTYPE key '{key}' holds a {} but a {wanted} was expected",
        found.type_name()
    ))
}

/// In-memory [`CacheProvider`].
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    entries: DashMap<String, Entry>,
}

impl MemoryCacheProvider {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        match self.entries.get(key).as_deref() {
            None => Ok(None),
            Some(Entry::Value(v)) => Ok(Some(v.clone())),
            Some(other) => Err(wrong_type(key, other, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .insert(key.to_string(), Entry::Value(value.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> AppResult<()> {
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match slot.value_mut() {
            Entry::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, other, "hash")),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        match self.entries.get(key).as_deref() {
            None => Ok(None),
            Some(Entry::Hash(map)) => Ok(map.get(field).cloned()),
            Some(other) => Err(wrong_type(key, other, "hash")),
        }
    }

    async fn hgetall(&self, key: &str) -> AppResult<Vec<(String, String)>> {
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(Entry::Hash(map)) => Ok(map
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()),
            Some(other) => Err(wrong_type(key, other, "hash")),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> AppResult<bool> {
        match self.entries.entry(key.to_string()) {
            MapEntry::Vacant(_) => Ok(false),
            MapEntry::Occupied(mut occupied) => {
                let (removed, now_empty) = match occupied.get_mut() {
                    Entry::Hash(map) => (map.remove(field).is_some(), map.is_empty()),
                    other => return Err(wrong_type(key, other, "hash")),
                };
                if now_empty {
                    occupied.remove();
                }
                Ok(removed)
            }
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        match slot.value_mut() {
            Entry::Set(set) => Ok(set.insert(member.to_string())),
            other => Err(wrong_type(key, other, "set")),
        }
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        match self.entries.get(key).as_deref() {
            None => Ok(0),
            Some(Entry::Set(set)) => Ok(set.len() as u64),
            Some(other) => Err(wrong_type(key, other, "set")),
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
