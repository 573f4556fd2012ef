//! # tator-entity
//!
//! Domain models for the Tator job subsystem. Every struct in this crate
//! is either a database row (deriving `sqlx::FromRow`) or a wire value
//! object exchanged with workers and progress subscribers.

pub mod algorithm;
pub mod job;
pub mod progress;
pub mod project;
