//! In-memory algorithm and membership directories.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use tator_core::error::AppError;
use tator_core::result::AppResult;
use tator_core::types::{AlgorithmId, ProjectId, UserId};
use tator_entity::algorithm::Algorithm;

use crate::store::{AlgorithmStore, MembershipStore};

/// An [`AlgorithmStore`] kept in a map.
#[derive(Debug, Default)]
pub struct MemoryAlgorithmStore {
    rows: RwLock<HashMap<AlgorithmId, Algorithm>>,
    next_id: AtomicI64,
}

impl MemoryAlgorithmStore {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlgorithmStore for MemoryAlgorithmStore {
    async fn create(&self, name: &str, max_concurrent: i32) -> AppResult<Algorithm> {
        if max_concurrent < 1 {
            return Err(AppError::validation("max_concurrent must be at least 1"));
        }
        let id = AlgorithmId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let algorithm = Algorithm {
            id,
            name: name.to_string(),
            max_concurrent,
            created_at: Utc::now(),
        };
        self.rows.write().await.insert(id, algorithm.clone());
        Ok(algorithm)
    }

    async fn find_by_id(&self, id: AlgorithmId) -> AppResult<Option<Algorithm>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn concurrency_limits(
        &self,
        ids: &[AlgorithmId],
    ) -> AppResult<HashMap<AlgorithmId, usize>> {
        let rows = self.rows.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id).map(|a| (*id, a.limit())))
            .collect())
    }
}

/// A [`MembershipStore`] kept in a map.
#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    projects: RwLock<HashMap<UserId, BTreeSet<ProjectId>>>,
}

impl MemoryMembershipStore {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn projects_for_user(&self, user: UserId) -> AppResult<Vec<ProjectId>> {
        Ok(self
            .projects
            .read()
            .await
            .get(&user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add(&self, user: UserId, project: ProjectId) -> AppResult<()> {
        self.projects
            .write()
            .await
            .entry(user)
            .or_default()
            .insert(project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limits_only_for_known_algorithms() {
        let store = MemoryAlgorithmStore::new();
        let a = store.create("tracker", 2).await.unwrap();
        let limits = store
            .concurrency_limits(&[a.id, AlgorithmId(999)])
            .await
            .unwrap();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[&a.id], 2);
        assert!(store.create("bad", 0).await.is_err());
    }

    #[tokio::test]
    async fn memberships_are_deduplicated_and_sorted() {
        let store = MemoryMembershipStore::new();
        store.add(UserId(1), ProjectId(9)).await.unwrap();
        store.add(UserId(1), ProjectId(2)).await.unwrap();
        store.add(UserId(1), ProjectId(9)).await.unwrap();
        assert_eq!(
            store.projects_for_user(UserId(1)).await.unwrap(),
            vec![ProjectId(2), ProjectId(9)]
        );
        assert!(store.projects_for_user(UserId(2)).await.unwrap().is_empty());
    }
}
