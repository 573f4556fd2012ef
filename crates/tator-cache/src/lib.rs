//! # tator-cache
//!
//! Shared key/value cache used for progress replay hashes, group
//! membership sets, and worker heartbeats. Supports two modes:
//!
//! - **memory**: in-process store using [dashmap](https://crates.io/crates/dashmap)
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
