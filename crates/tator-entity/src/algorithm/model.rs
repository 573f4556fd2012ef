//! Algorithm entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tator_core::types::AlgorithmId;

/// An algorithm workers can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Algorithm {
    /// Unique algorithm identifier.
    pub id: AlgorithmId,
    /// Display name.
    pub name: String,
    /// Upper bound on simultaneously STARTED jobs for this algorithm.
    pub max_concurrent: i32,
    /// When the algorithm was registered.
    pub created_at: DateTime<Utc>,
}

impl Algorithm {
    /// The concurrency limit as a count, treating non-positive values as 1.
    pub fn limit(&self) -> usize {
        self.max_concurrent.max(1) as usize
    }
}
