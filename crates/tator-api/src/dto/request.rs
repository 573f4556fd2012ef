//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use tator_core::types::ProjectId;
use tator_entity::job::{CreateJob, JobChannel, JobStatus};
use tator_entity::progress::{JobType, ProgressHeader, ProgressState};

type Fields = serde_json::Map<String, serde_json::Value>;

/// One entry of a progress batch posted by a worker.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProgressUpdate {
    /// Prefix of the group the job reports into.
    pub job_type: JobType,
    /// Job group.
    #[validate(length(min = 1, message = "gid is required"))]
    pub gid: String,
    /// The job.
    #[validate(length(min = 1, message = "uid is required"))]
    pub uid: String,
    /// Human-readable job name.
    pub name: String,
    /// Lifecycle state to announce.
    pub state: ProgressState,
    /// Status line.
    #[serde(default)]
    pub message: String,
    /// Percent complete; only read for `started`.
    #[validate(range(max = 100, message = "progress must be between 0 and 100"))]
    pub progress: Option<u8>,
    /// Submitting worker id.
    pub swid: Option<String>,
    /// Submitting user.
    pub user: Option<String>,
    /// Media section the job belongs to.
    pub section: Option<String>,
    /// Sections touched by the job.
    pub sections: Option<serde_json::Value>,
    /// Media the job operates on.
    pub media_ids: Option<serde_json::Value>,
    /// Extra fields merged into a `finished` broadcast.
    #[validate(custom(function = "validate_object"))]
    pub aux: Option<serde_json::Value>,
}

impl ProgressUpdate {
    /// Header for the producer speaking for this job in `project_id`.
    pub fn header(&self, project_id: ProjectId) -> ProgressHeader {
        let mut extra = Fields::new();
        if let Some(section) = &self.section {
            extra.insert("section".to_string(), section.clone().into());
        }
        if let Some(sections) = &self.sections {
            extra.insert("sections".to_string(), sections.clone());
        }
        if let Some(media_ids) = &self.media_ids {
            extra.insert("media_ids".to_string(), media_ids.clone());
        }
        ProgressHeader {
            job_type: self.job_type,
            project_id,
            gid: self.gid.clone(),
            uid: self.uid.clone(),
            name: self.name.clone(),
            user: self.user.clone(),
            swid: self.swid.clone(),
            extra,
        }
    }

    /// The `aux` object, if any.
    pub fn auxiliary(&self) -> Option<Fields> {
        match &self.aux {
            Some(serde_json::Value::Object(map)) => Some(map.clone()),
            _ => None,
        }
    }
}

fn validate_object(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("aux_must_be_object"))
    }
}

/// Aggregate counts for a job group.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SummaryUpdate {
    /// Prefix of the group.
    pub job_type: JobType,
    /// Job group.
    #[validate(length(min = 1, message = "gid is required"))]
    pub gid: String,
    /// Jobs in the group.
    pub num_jobs: u64,
    /// Jobs of the group that are done.
    pub num_complete: u64,
    /// Group name stamped on the summary.
    pub name: Option<String>,
}

/// Enqueue a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// Target worker pool.
    pub channel: JobChannel,
    /// Parameters forwarded to the worker.
    #[serde(default)]
    pub message: serde_json::Value,
}

impl From<CreateJobRequest> for CreateJob {
    fn from(req: CreateJobRequest) -> Self {
        Self {
            channel: req.channel,
            message: req.message,
        }
    }
}

/// A worker recording that it picked up a job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClaimRequest {
    /// Name of the claiming pod.
    #[validate(length(min = 1, max = 253, message = "pod_name must be 1-253 characters"))]
    pub pod_name: String,
}

/// Filters for listing jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQuery {
    /// Only this channel.
    pub channel: Option<JobChannel>,
    /// Only this status.
    pub status: Option<JobStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(raw: serde_json::Value) -> ProgressUpdate {
        serde_json::from_value(raw).expect("parse update")
    }

    #[test]
    fn header_carries_optional_fields() {
        let u = update(json!({
            "job_type": "upload", "gid": "g", "uid": "u", "name": "a.mp4",
            "state": "started", "message": "Uploading...", "progress": 10,
            "section": "Batch", "media_ids": [4, 5]
        }));
        let header = u.header(ProjectId(2));
        assert_eq!(header.project_id, ProjectId(2));
        assert_eq!(header.extra.get("section"), Some(&json!("Batch")));
        assert_eq!(header.extra.get("media_ids"), Some(&json!([4, 5])));
        assert!(!header.extra.contains_key("sections"));
    }

    #[test]
    fn progress_above_hundred_is_invalid() {
        let u = update(json!({
            "job_type": "algorithm", "gid": "g", "uid": "u", "name": "n",
            "state": "started", "progress": 101
        }));
        assert!(u.validate().is_err());
    }

    #[test]
    fn aux_must_be_an_object() {
        let u = update(json!({
            "job_type": "download", "gid": "g", "uid": "u", "name": "n",
            "state": "finished", "aux": [1]
        }));
        assert!(u.validate().is_err());
    }

    #[test]
    fn empty_uid_is_invalid() {
        let u = update(json!({
            "job_type": "download", "gid": "g", "uid": "", "name": "n", "state": "queued"
        }));
        assert!(u.validate().is_err());
    }
}
