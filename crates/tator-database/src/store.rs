//! Storage traits the scheduler, workers, and API depend on.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`]
//! and an in-memory one in [`crate::memory`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tator_core::result::AppResult;
use tator_core::types::{AlgorithmId, JobId, ProjectId, UserId};
use tator_entity::algorithm::Algorithm;
use tator_entity::job::{CreateJob, Job, JobChannel, JobStatus};

/// The job queue table.
///
/// Status transitions are conditional on the current status so that a
/// transition racing with a deletion or a second writer is a no-op
/// reported as `false` rather than an error.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a QUEUED job.
    async fn create(&self, data: &CreateJob) -> AppResult<Job>;

    /// Find a job by ID.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// List jobs, optionally filtered, ordered by `(submitted, id)`.
    async fn list(
        &self,
        channel: Option<JobChannel>,
        status: Option<JobStatus>,
    ) -> AppResult<Vec<Job>>;

    /// QUEUED -> STARTED, stamping `updated`.
    async fn mark_started(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool>;

    /// STARTED -> QUEUED, clearing the pod and stamping `updated`.
    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Record the pod that picked up a STARTED job.
    async fn claim(&self, id: JobId, pod_name: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Remove a job once its outcome is known. Returns `true` if it existed.
    async fn delete(&self, id: JobId) -> AppResult<bool>;

    /// Count jobs per status on one channel.
    async fn count(&self, channel: JobChannel, status: JobStatus) -> AppResult<u64> {
        Ok(self.list(Some(channel), Some(status)).await?.len() as u64)
    }
}

/// Registered algorithms.
#[async_trait]
pub trait AlgorithmStore: Send + Sync + std::fmt::Debug + 'static {
    /// Register an algorithm.
    async fn create(&self, name: &str, max_concurrent: i32) -> AppResult<Algorithm>;

    /// Find an algorithm by ID.
    async fn find_by_id(&self, id: AlgorithmId) -> AppResult<Option<Algorithm>>;

    /// `max_concurrent` for each of `ids` that exists.
    async fn concurrency_limits(&self, ids: &[AlgorithmId])
    -> AppResult<HashMap<AlgorithmId, usize>>;
}

/// Project membership lookups.
#[async_trait]
pub trait MembershipStore: Send + Sync + std::fmt::Debug + 'static {
    /// Projects `user` belongs to, ascending.
    async fn projects_for_user(&self, user: UserId) -> AppResult<Vec<ProjectId>>;

    /// Add `user` to `project`. Adding twice is a no-op.
    async fn add(&self, user: UserId, project: ProjectId) -> AppResult<()>;
}
