//! Algorithm repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;
use tator_core::types::AlgorithmId;
use tator_entity::algorithm::Algorithm;

use crate::store::AlgorithmStore;

/// PostgreSQL-backed [`AlgorithmStore`].
#[derive(Debug, Clone)]
pub struct PgAlgorithmRepository {
    pool: PgPool,
}

impl PgAlgorithmRepository {
    /// Create a new algorithm repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlgorithmStore for PgAlgorithmRepository {
    async fn create(&self, name: &str, max_concurrent: i32) -> AppResult<Algorithm> {
        if max_concurrent < 1 {
            return Err(AppError::validation("max_concurrent must be at least 1"));
        }
        sqlx::query_as::<_, Algorithm>(
            "INSERT INTO algorithms (name, max_concurrent) VALUES ($1, $2) \
             RETURNING id, name, max_concurrent, created_at",
        )
        .bind(name)
        .bind(max_concurrent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create algorithm", e))
    }

    async fn find_by_id(&self, id: AlgorithmId) -> AppResult<Option<Algorithm>> {
        sqlx::query_as::<_, Algorithm>(
            "SELECT id, name, max_concurrent, created_at FROM algorithms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find algorithm", e))
    }

    async fn concurrency_limits(
        &self,
        ids: &[AlgorithmId],
    ) -> AppResult<HashMap<AlgorithmId, usize>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, Algorithm>(
            "SELECT id, name, max_concurrent, created_at FROM algorithms WHERE id = ANY($1)",
        )
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load algorithm limits", e)
        })?;

        Ok(rows.into_iter().map(|a| (a.id, a.limit())).collect())
    }
}
