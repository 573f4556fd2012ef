//! Job entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tator_core::types::{AlgorithmId, JobId};

use super::channel::JobChannel;
use super::status::JobStatus;

/// One pending or in-flight unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Worker pool the job is routed to.
    pub channel: JobChannel,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Opaque parameters forwarded verbatim to the worker.
    pub message: serde_json::Value,
    /// Pod that claimed the job, if any.
    pub pod_name: Option<String>,
    /// Creation time; FIFO order within a channel.
    pub submitted: DateTime<Utc>,
    /// Last status change or claim.
    pub updated: DateTime<Utc>,
}

impl Job {
    /// The algorithm this job runs, read from `message.algorithm_id`.
    ///
    /// Accepts both numbers and numeric strings since workers and older
    /// clients disagree on the encoding.
    pub fn algorithm_id(&self) -> Option<AlgorithmId> {
        match self.message.get("algorithm_id")? {
            serde_json::Value::Number(n) => n.as_i64().map(AlgorithmId),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Whether the row has not been touched for longer than `window`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.updated > window
    }

    /// Whether the job is assigned to a pod outside `live_pods`.
    pub fn is_orphaned(&self, live_pods: &[String]) -> bool {
        match &self.pod_name {
            Some(pod) => !live_pods.iter().any(|p| p == pod),
            None => true,
        }
    }

    /// Ordering key for FIFO admission.
    pub fn fifo_key(&self) -> (DateTime<Utc>, JobId) {
        (self.submitted, self.id)
    }
}

/// Data required to enqueue a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Target worker pool.
    pub channel: JobChannel,
    /// Worker parameters.
    pub message: serde_json::Value,
}
