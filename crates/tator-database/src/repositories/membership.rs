//! Project membership repository.

use async_trait::async_trait;
use sqlx::PgPool;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_core::types::{ProjectId, UserId};

use crate::store::MembershipStore;

/// PostgreSQL-backed [`MembershipStore`].
#[derive(Debug, Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    /// Create a new membership repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipRepository {
    async fn projects_for_user(&self, user: UserId) -> AppResult<Vec<ProjectId>> {
        sqlx::query_scalar::<_, ProjectId>(
            "SELECT project_id FROM memberships WHERE user_id = $1 ORDER BY project_id",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list memberships", e))
    }

    async fn add(&self, user: UserId, project: ProjectId) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO memberships (user_id, project_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user)
        .bind(project)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to add membership", e))?;
        Ok(())
    }
}
