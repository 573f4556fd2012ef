//! Payload handed to a worker queue.

use serde::{Deserialize, Serialize};
use tator_core::types::JobId;

use super::model::Job;

/// What a worker pops off its queue: the job id plus the job's message
/// fields flattened alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedJob {
    /// Row the worker must claim and eventually delete.
    pub job_id: JobId,
    /// The job's message. Non-object messages travel under `message`.
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl DispatchedJob {
    /// Build the payload for `job`.
    pub fn from_job(job: &Job) -> Self {
        let params = match &job.message {
            serde_json::Value::Object(map) => {
                let mut map = map.clone();
                map.remove("job_id");
                map
            }
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("message".to_string(), other.clone());
                map
            }
        };
        Self {
            job_id: job.id,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobChannel, JobStatus};
    use chrono::Utc;
    use serde_json::json;

    fn job(message: serde_json::Value) -> Job {
        Job {
            id: JobId(77),
            channel: JobChannel::Algorithm,
            status: JobStatus::Queued,
            message,
            pod_name: None,
            submitted: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn object_message_is_flattened_next_to_job_id() {
        let payload = DispatchedJob::from_job(&job(json!({"algorithm_id": 3, "media_ids": [1, 2]})));
        let wire = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(wire, json!({"job_id": 77, "algorithm_id": 3, "media_ids": [1, 2]}));
    }

    #[test]
    fn row_id_wins_over_message_job_id() {
        let payload = DispatchedJob::from_job(&job(json!({"job_id": 1})));
        assert_eq!(payload.job_id, JobId(77));
        assert!(payload.params.is_empty());
    }

    #[test]
    fn scalar_message_is_wrapped() {
        let payload = DispatchedJob::from_job(&job(json!("transcode me")));
        let wire = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(wire, json!({"job_id": 77, "message": "transcode me"}));
    }
}
