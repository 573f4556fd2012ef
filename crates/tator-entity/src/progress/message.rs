//! Progress and summary messages.
//!
//! Both travel as a JSON object tagged with `type`; subscribers receive the
//! exact string the producer broadcast.

use serde::{Deserialize, Serialize};
use tator_core::types::ProjectId;

use super::kind::{JobType, ProgressState};

/// Static identifying fields stamped on every message of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressHeader {
    /// Prefix of the group the job reports into.
    pub job_type: JobType,
    /// Project the job belongs to.
    pub project_id: ProjectId,
    /// Group the job is part of.
    pub gid: String,
    /// The job itself.
    pub uid: String,
    /// Human-readable job name.
    pub name: String,
    /// Submitting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Submitting worker id, recorded as a heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swid: Option<String>,
    /// Auxiliary fields such as `section`, `sections`, or `media_ids`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One job's state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Identifying header.
    #[serde(flatten)]
    pub header: ProgressHeader,
    /// Lifecycle state.
    pub state: ProgressState,
    /// Human-readable status line.
    pub message: String,
    /// Percent complete, 0-100.
    pub progress: u8,
}

/// Aggregate completion of a job group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMessage {
    /// Prefix of the group.
    pub job_type: JobType,
    /// Project the group belongs to.
    pub project_id: ProjectId,
    /// The group.
    pub gid: String,
    /// Jobs started in the group so far.
    pub num_procs: u64,
    /// Jobs of the group that reached a terminal state.
    pub num_complete: u64,
    /// Static group fields such as the group name or submitting user.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SummaryMessage {
    /// Whether every started job in the group is done.
    pub fn is_drained(&self) -> bool {
        self.num_complete >= self.num_procs
    }
}

/// Anything broadcast on a progress group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// A single job update.
    #[serde(rename = "progress")]
    Progress(ProgressMessage),
    /// A group summary.
    #[serde(rename = "progress_summary")]
    Summary(SummaryMessage),
}

impl ProgressEvent {
    /// Serialize to the wire string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
