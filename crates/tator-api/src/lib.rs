//! # tator-api
//!
//! HTTP API layer for the Tator job subsystem built on Axum.
//!
//! Provides the progress ingress used by workers, the job table endpoints,
//! the WebSocket progress stream, health checks, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_state, serve};
pub use router::build_router;
pub use state::AppState;
