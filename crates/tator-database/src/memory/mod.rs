//! In-memory store implementations for tests and single-process
//! development setups.

pub mod directory;
pub mod job;

pub use directory::{MemoryAlgorithmStore, MemoryMembershipStore};
pub use job::MemoryJobStore;
