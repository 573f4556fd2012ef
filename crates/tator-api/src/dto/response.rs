//! Response DTOs.

use serde::{Deserialize, Serialize};

use tator_realtime::metrics::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Result of applying a progress batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressAccepted {
    /// Messages broadcast.
    pub accepted: usize,
}

/// Basic health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Detailed health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `ok` when every backend answered, else `degraded`.
    pub status: String,
    /// Database status; `disabled` with in-memory stores.
    pub database: String,
    /// Cache status.
    pub cache: String,
    /// Open progress connections.
    pub ws_connections: usize,
    /// Realtime counters.
    pub realtime: MetricsSnapshot,
}
