//! Bookkeeping of which connection joined which progress group.

pub mod registry;

pub use registry::SubscriptionRegistry;
