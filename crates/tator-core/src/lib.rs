//! # tator-core
//!
//! Core crate for the Tator job admission and progress subsystem. Contains
//! the cache provider trait, configuration schemas, typed identifiers,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Tator crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
