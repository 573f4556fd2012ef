//! In-memory job table.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tator_core::result::AppResult;
use tator_core::types::JobId;
use tator_entity::job::{CreateJob, Job, JobChannel, JobStatus};

use crate::store::JobStore;

/// A [`JobStore`] held in a single locked map.
#[derive(Debug)]
pub struct MemoryJobStore {
    rows: RwLock<BTreeMap<JobId, Job>>,
    next_id: AtomicI64,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a QUEUED job with an explicit submission time.
    pub async fn create_at(&self, data: &CreateJob, submitted: DateTime<Utc>) -> Job {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let job = Job {
            id,
            channel: data.channel,
            status: JobStatus::Queued,
            message: data.message.clone(),
            pod_name: None,
            submitted,
            updated: submitted,
        };
        self.rows.write().await.insert(id, job.clone());
        job
    }

    async fn update_if<F>(&self, id: JobId, expected: JobStatus, apply: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(job) if job.status == expected => {
                apply(job);
                true
            }
            _ => false,
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, data: &CreateJob) -> AppResult<Job> {
        Ok(self.create_at(data, Utc::now()).await)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        channel: Option<JobChannel>,
        status: Option<JobStatus>,
    ) -> AppResult<Vec<Job>> {
        let rows = self.rows.read().await;
        let mut jobs: Vec<Job> = rows
            .values()
            .filter(|j| channel.is_none_or(|c| j.channel == c))
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by_key(Job::fifo_key);
        Ok(jobs)
    }

    async fn mark_started(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .update_if(id, JobStatus::Queued, |job| {
                job.status = JobStatus::Started;
                job.pod_name = None;
                job.updated = now;
            })
            .await)
    }

    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .update_if(id, JobStatus::Started, |job| {
                job.status = JobStatus::Queued;
                job.pod_name = None;
                job.updated = now;
            })
            .await)
    }

    async fn claim(&self, id: JobId, pod_name: &str, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .update_if(id, JobStatus::Started, |job| {
                job.pod_name = Some(pod_name.to_string());
                job.updated = now;
            })
            .await)
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn create(channel: JobChannel) -> CreateJob {
        CreateJob {
            channel,
            message: json!({"algorithm_id": 1}),
        }
    }

    #[tokio::test]
    async fn list_is_fifo_and_filtered() {
        let store = MemoryJobStore::new();
        let t0 = Utc::now();
        let late = store.create_at(&create(JobChannel::Algorithm), t0 + Duration::seconds(5)).await;
        let early = store.create_at(&create(JobChannel::Algorithm), t0).await;
        store.create_at(&create(JobChannel::Transcode), t0).await;

        let jobs = store
            .list(Some(JobChannel::Algorithm), Some(JobStatus::Queued))
            .await
            .unwrap();
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(store.list(None, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transitions_are_conditional() {
        let store = MemoryJobStore::new();
        let job = store.create(&create(JobChannel::Package)).await.unwrap();
        let now = Utc::now();

        assert!(!store.claim(job.id, "pod-1", now).await.unwrap());
        assert!(!store.requeue(job.id, now).await.unwrap());
        assert!(store.mark_started(job.id, now).await.unwrap());
        assert!(!store.mark_started(job.id, now).await.unwrap());
        assert!(store.claim(job.id, "pod-1", now).await.unwrap());

        let row = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Started);
        assert_eq!(row.pod_name.as_deref(), Some("pod-1"));

        assert!(store.requeue(job.id, now).await.unwrap());
        let row = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Queued);
        assert_eq!(row.pod_name, None);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryJobStore::new();
        let job = store.create(&create(JobChannel::Transcode)).await.unwrap();
        assert!(store.delete(job.id).await.unwrap());
        assert!(!store.delete(job.id).await.unwrap());
        assert_eq!(
            store.count(JobChannel::Transcode, JobStatus::Queued).await.unwrap(),
            0
        );
    }
}
