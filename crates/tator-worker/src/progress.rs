//! Terminal progress reports sent by worker pods.
//!
//! A worker records how a job ended before deleting its row, so
//! subscribers see `failed` or `finished` for every job that leaves the
//! queue. Reports go through the API's progress ingress.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_core::types::ProjectId;
use tator_entity::job::{DispatchedJob, JobChannel};
use tator_entity::progress::{JobType, ProgressState};

use crate::cluster::upstream_status_error;

/// Who a job reports as: its progress group and identity within it.
///
/// Read from the dispatched payload. `project_id` is required; `gid`,
/// `uid` and `name` fall back to values derived from the job id, and
/// `job_type` to the channel's usual prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTarget {
    pub job_type: JobType,
    pub project_id: ProjectId,
    pub gid: String,
    pub uid: String,
    pub name: String,
}

impl ProgressTarget {
    /// Target for `job` popped from `channel`, or `None` when the payload
    /// names no project.
    pub fn from_job(channel: JobChannel, job: &DispatchedJob) -> Option<Self> {
        let project_id = job.params.get("project_id").and_then(Value::as_i64)?;
        let text = |key: &str| job.params.get(key).and_then(Value::as_str).map(str::to_string);
        let job_type = text("job_type")
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| default_job_type(channel));
        let fallback = format!("job-{}", job.job_id);

        Some(Self {
            job_type,
            project_id: ProjectId(project_id),
            gid: text("gid").unwrap_or_else(|| fallback.clone()),
            uid: text("uid").unwrap_or(fallback),
            name: text("name").unwrap_or_else(|| format!("{channel} job {}", job.job_id)),
        })
    }
}

fn default_job_type(channel: JobChannel) -> JobType {
    match channel {
        JobChannel::Algorithm => JobType::Algorithm,
        JobChannel::Transcode => JobType::Upload,
        JobChannel::Package => JobType::Download,
    }
}

/// How a job ended, addressed to its progress group.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalReport {
    pub target: ProgressTarget,
    /// `Failed` or `Finished`.
    pub state: ProgressState,
    pub message: String,
    /// Extra fields merged into a `finished` broadcast.
    pub aux: Option<Map<String, Value>>,
}

/// Delivers terminal reports to subscribers.
#[async_trait]
pub trait ProgressReporter: Send + Sync + std::fmt::Debug {
    async fn report(&self, report: &TerminalReport) -> AppResult<()>;
}

#[derive(Debug, Serialize)]
struct IngressMessage<'a> {
    job_type: JobType,
    gid: &'a str,
    uid: &'a str,
    name: &'a str,
    state: ProgressState,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aux: Option<&'a Map<String, Value>>,
}

impl<'a> From<&'a TerminalReport> for IngressMessage<'a> {
    fn from(report: &'a TerminalReport) -> Self {
        Self {
            job_type: report.target.job_type,
            gid: &report.target.gid,
            uid: &report.target.uid,
            name: &report.target.name,
            state: report.state,
            message: &report.message,
            aux: report.aux.as_ref(),
        }
    }
}

/// Posts reports to `POST {base_url}/api/progress/{project_id}`.
#[derive(Debug, Clone)]
pub struct HttpProgressReporter {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProgressReporter {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build progress HTTP client",
                    e,
                )
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn progress_url(&self, project_id: ProjectId) -> String {
        format!("{}/api/progress/{}", self.base_url, project_id)
    }
}

#[async_trait]
impl ProgressReporter for HttpProgressReporter {
    async fn report(&self, report: &TerminalReport) -> AppResult<()> {
        let url = self.progress_url(report.target.project_id);
        let batch = [IngressMessage::from(report)];

        let response = self.http.post(&url).json(&batch).send().await.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, "Progress ingress request failed", e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_status_error(
                status,
                format!("Progress ingress returned {status} for uid {}", report.target.uid),
            ));
        }
        debug!(uid = %report.target.uid, state = ?report.state, "Progress reported");
        Ok(())
    }
}
