//! # tator-realtime
//!
//! Progress fan-out for the Tator job subsystem. Provides:
//!
//! - [`ProgressProducer`]: lifecycle broadcasts, group summaries, and the
//!   latest-state mirror in the shared cache
//! - [`ProgressConsumer`]: one client connection that joins its projects'
//!   groups, replays the latest state, then streams live broadcasts
//! - In-process broadcast groups with an optional Redis relay between
//!   API replicas

pub mod bridge;
pub mod channel;
pub mod connection;
pub mod consumer;
pub mod metrics;
pub mod producer;
pub mod server;

pub use bridge::ProgressPublisher;
pub use channel::registry::SubscriptionRegistry;
pub use connection::manager::ConnectionManager;
pub use consumer::{ConsumerState, ProgressConsumer};
pub use metrics::RealtimeMetrics;
pub use producer::ProgressProducer;
pub use server::RealtimeEngine;
