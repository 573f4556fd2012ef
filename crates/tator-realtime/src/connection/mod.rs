//! Client connection handles and their lifecycle.

pub mod handle;
pub mod manager;

pub use handle::{ConnectionHandle, ConnectionId};
pub use manager::ConnectionManager;
