//! Core traits defined in `tator-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
