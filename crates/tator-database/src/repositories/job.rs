//! Job table repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_core::types::JobId;
use tator_entity::job::{CreateJob, Job, JobChannel, JobStatus};

use crate::store::JobStore;

const COLUMNS: &str = "id, channel, status, message, pod_name, submitted, updated";

/// PostgreSQL-backed [`JobStore`].
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

#[async_trait]
impl JobStore for PgJobRepository {
    async fn create(&self, data: &CreateJob) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (channel, status, message) VALUES ($1, 'queued', $2) \
             RETURNING {COLUMNS}"
        ))
        .bind(data.channel)
        .bind(&data.message)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to create job"))
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(&format!("SELECT {COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find job"))
    }

    async fn list(
        &self,
        channel: Option<JobChannel>,
        status: Option<JobStatus>,
    ) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE ($1::job_channel IS NULL OR channel = $1) \
               AND ($2::job_status IS NULL OR status = $2) \
             ORDER BY submitted ASC, id ASC"
        ))
        .bind(channel)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list jobs"))
    }

    async fn mark_started(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'started', pod_name = NULL, updated = $2 \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark job started"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'queued', pod_name = NULL, updated = $2 \
             WHERE id = $1 AND status = 'started'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to requeue job"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn claim(&self, id: JobId, pod_name: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET pod_name = $2, updated = $3 WHERE id = $1 AND status = 'started'",
        )
        .bind(id)
        .bind(pod_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to claim job"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete job"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, channel: JobChannel, status: JobStatus) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE channel = $1 AND status = $2")
                .bind(channel)
                .bind(status)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err("Failed to count jobs"))?;
        Ok(count as u64)
    }
}
