//! Project membership, used to decide which progress groups a user sees.

pub mod membership;

pub use membership::Membership;
