//! PostgreSQL repository implementations.

pub mod algorithm;
pub mod job;
pub mod membership;

pub use algorithm::PgAlgorithmRepository;
pub use job::PgJobRepository;
pub use membership::PgMembershipRepository;
