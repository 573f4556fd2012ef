//! # tator-database
//!
//! PostgreSQL connection management, the job/algorithm/membership store
//! traits, and their PostgreSQL and in-memory implementations.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;
pub mod stores;

pub use connection::DatabasePool;
pub use store::{AlgorithmStore, JobStore, MembershipStore};
pub use stores::Stores;
