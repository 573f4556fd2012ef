//! Progress producer.
//!
//! One producer speaks for one job (`uid`) inside one job group (`gid`).
//! Each broadcast goes to the `(prefix, project)` pub/sub group and is
//! mirrored into that group's latest-state hash under the job's uid, so a
//! subscriber joining later can replay it. Terminal transitions move the
//! uid into the group's done set and refresh the group summary, which is
//! garbage-collected once every started job is done.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use tator_cache::CacheManager;
use tator_cache::keys;
use tator_core::error::AppError;
use tator_core::result::AppResult;
use tator_core::traits::cache::CacheProvider;
use tator_entity::progress::{
    ProgressEvent, ProgressHeader, ProgressMessage, ProgressState, SummaryMessage,
};

use crate::bridge::ProgressPublisher;
use crate::metrics::RealtimeMetrics;

type Fields = serde_json::Map<String, serde_json::Value>;

/// Announces lifecycle transitions of one job.
#[derive(Debug, Clone)]
pub struct ProgressProducer {
    cache: CacheManager,
    publisher: Arc<dyn ProgressPublisher>,
    metrics: Option<Arc<RealtimeMetrics>>,
    header: ProgressHeader,
    group_header: Fields,
}

impl ProgressProducer {
    /// Create a producer for the job described by `header`.
    pub fn new(
        cache: CacheManager,
        publisher: Arc<dyn ProgressPublisher>,
        header: ProgressHeader,
    ) -> Self {
        Self {
            cache,
            publisher,
            metrics: None,
            header,
            group_header: Fields::new(),
        }
    }

    /// Static fields stamped on every group summary.
    pub fn with_group_header(mut self, group_header: Fields) -> Self {
        self.group_header = group_header;
        self
    }

    /// Count broadcasts in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<RealtimeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The job's identifying header.
    pub fn header(&self) -> &ProgressHeader {
        &self.header
    }

    fn group(&self) -> String {
        keys::group(self.header.job_type, self.header.project_id)
    }

    fn latest_key(&self) -> String {
        keys::latest(self.header.job_type, self.header.project_id)
    }

    /// Announce that the job was accepted. Clients show it as started at
    /// 0%, and the uid joins the group's started set.
    pub async fn queued(&self, message: &str) -> AppResult<()> {
        self.broadcast(ProgressState::Started, message, 0, None)
            .await?;
        self.cache
            .sadd(&keys::gid_started(&self.header.gid), &self.header.uid)
            .await?;
        self.refresh_summary().await
    }

    /// Report intermediate progress, 0 to 100 inclusive.
    pub async fn progress(&self, message: &str, percent: u8) -> AppResult<()> {
        if percent > 100 {
            return Err(AppError::validation(format!(
                "progress must be between 0 and 100, got {percent}"
            )));
        }
        self.broadcast(ProgressState::Started, message, percent, None)
            .await
    }

    /// Report that the job failed.
    pub async fn failed(&self, message: &str) -> AppResult<()> {
        self.broadcast(ProgressState::Failed, message, 0, None)
            .await?;
        self.mark_done().await
    }

    /// Report that the job finished, merging `auxiliary` fields such as
    /// output URLs into the broadcast.
    pub async fn finished(&self, message: &str, auxiliary: Option<Fields>) -> AppResult<()> {
        self.broadcast(ProgressState::Finished, message, 100, auxiliary)
            .await?;
        self.mark_done().await
    }

    /// Broadcast externally computed group totals, for workers that fan
    /// out sub-jobs themselves.
    pub async fn summary(&self, num_procs: u64, num_complete: u64) -> AppResult<()> {
        let summary = self.summary_message(num_procs, num_complete);
        let drained = summary.is_drained();
        let payload = self.publish(&ProgressEvent::Summary(summary)).await?;
        if drained {
            self.cache
                .hdel(&self.latest_key(), &self.header.gid)
                .await?;
            return Ok(());
        }
        self.cache
            .hset(&self.latest_key(), &self.header.gid, &payload)
            .await
    }

    async fn mark_done(&self) -> AppResult<()> {
        self.cache
            .sadd(&keys::gid_done(&self.header.gid), &self.header.uid)
            .await?;
        self.cache
            .hdel(&self.latest_key(), &self.header.uid)
            .await?;
        self.refresh_summary().await
    }

    /// Recount the group and publish or collect its summary.
    async fn refresh_summary(&self) -> AppResult<()> {
        let gid = &self.header.gid;
        let started_key = keys::gid_started(gid);
        let done_key = keys::gid_done(gid);
        let started = self.cache.scard(&started_key).await?;
        let done = self.cache.scard(&done_key).await?;

        if started >= done {
            let summary = self.summary_message(started, done);
            let payload = self.publish(&ProgressEvent::Summary(summary)).await?;
            self.cache.hset(&self.latest_key(), gid, &payload).await?;
        }

        if started <= done {
            self.cache.delete(&started_key).await?;
            self.cache.delete(&done_key).await?;
            self.cache.hdel(&self.latest_key(), gid).await?;
            debug!(gid = %gid, started, done, "Job group drained");
        }

        Ok(())
    }

    fn summary_message(&self, num_procs: u64, num_complete: u64) -> SummaryMessage {
        SummaryMessage {
            job_type: self.header.job_type,
            project_id: self.header.project_id,
            gid: self.header.gid.clone(),
            num_procs,
            num_complete,
            extra: self.group_header.clone(),
        }
    }

    async fn broadcast(
        &self,
        state: ProgressState,
        message: &str,
        progress: u8,
        auxiliary: Option<Fields>,
    ) -> AppResult<()> {
        let mut header = self.header.clone();
        if let Some(aux) = auxiliary {
            header.extra.extend(aux);
        }
        let event = ProgressEvent::Progress(ProgressMessage {
            header,
            state,
            message: message.to_string(),
            progress,
        });
        let payload = self.publish(&event).await?;
        self.cache
            .hset(&self.latest_key(), &self.header.uid, &payload)
            .await?;

        if let Some(swid) = &self.header.swid {
            if let Err(e) = self
                .cache
                .set(&keys::swid_heartbeat(swid), &Utc::now().to_rfc3339())
                .await
            {
                warn!(swid = %swid, error = %e, "Failed to record worker heartbeat");
            }
        }
        Ok(())
    }

    async fn publish(&self, event: &ProgressEvent) -> AppResult<String> {
        let payload = event.to_json()?;
        self.publisher.publish(&self.group(), &payload).await?;
        if let Some(metrics) = &self.metrics {
            metrics.message_published();
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryPubSub;
    use serde_json::{Value, json};
    use tator_core::types::ProjectId;
    use tator_entity::progress::JobType;
    use tokio::sync::broadcast;

    struct Fixture {
        cache: CacheManager,
        bus: Arc<MemoryPubSub>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cache: CacheManager::in_memory(),
                bus: Arc::new(MemoryPubSub::new(64)),
            }
        }

        fn producer(&self, gid: &str, uid: &str) -> ProgressProducer {
            let header = ProgressHeader {
                job_type: JobType::Algorithm,
                project_id: ProjectId(1),
                gid: gid.to_string(),
                uid: uid.to_string(),
                name: format!("job {uid}"),
                user: None,
                swid: None,
                extra: Fields::new(),
            };
            ProgressProducer::new(self.cache.clone(), self.bus.clone(), header)
        }

        async fn listen(&self) -> broadcast::Receiver<String> {
            self.bus.subscribe("algorithm_1").await
        }

        async fn latest(&self) -> Vec<(String, Value)> {
            let mut all: Vec<(String, Value)> = self
                .cache
                .hgetall("algorithm_latest_1")
                .await
                .unwrap()
                .into_iter()
                .map(|(k, v)| (k, serde_json::from_str(&v).unwrap()))
                .collect();
            all.sort_by(|a, b| a.0.cmp(&b.0));
            all
        }
    }

    fn drain(rx: &mut broadcast::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn queued_broadcasts_started_at_zero_and_summary() {
        let fx = Fixture::new();
        let mut rx = fx.listen().await;
        fx.producer("g", "u1").queued("Queued").await.unwrap();

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["type"], "progress");
        assert_eq!(msgs[0]["state"], "started");
        assert_eq!(msgs[0]["progress"], 0);
        assert_eq!(msgs[1]["type"], "progress_summary");
        assert_eq!(msgs[1]["num_procs"], 1);
        assert_eq!(msgs[1]["num_complete"], 0);

        let latest = fx.latest().await;
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].0, "g");
        assert_eq!(latest[1].0, "u1");
    }

    #[tokio::test]
    async fn progress_rejects_out_of_range() {
        let fx = Fixture::new();
        let err = fx.producer("g", "u1").progress("x", 101).await.unwrap_err();
        assert_eq!(err.kind, tator_core::error::ErrorKind::Validation);
        assert!(fx.latest().await.is_empty());
    }

    #[tokio::test]
    async fn latest_hash_keeps_last_value_per_uid() {
        let fx = Fixture::new();
        let p = fx.producer("g", "u1");
        p.queued("Queued").await.unwrap();
        p.progress("Working", 10).await.unwrap();
        p.progress("Working", 55).await.unwrap();

        let latest = fx.latest().await;
        let (_, job) = latest.iter().find(|(k, _)| k == "u1").unwrap();
        assert_eq!(job["progress"], 55);
    }

    #[tokio::test]
    async fn finished_merges_auxiliary_and_clears_latest() {
        let fx = Fixture::new();
        let mut rx = fx.listen().await;
        let p1 = fx.producer("g", "u1");
        let p2 = fx.producer("g", "u2");
        p1.queued("Queued").await.unwrap();
        p2.queued("Queued").await.unwrap();
        drain(&mut rx);

        let mut aux = Fields::new();
        aux.insert("url".to_string(), json!("https://example.com/out.zip"));
        p1.finished("Done", Some(aux)).await.unwrap();

        let msgs = drain(&mut rx);
        assert_eq!(msgs[0]["state"], "finished");
        assert_eq!(msgs[0]["url"], "https://example.com/out.zip");
        assert_eq!(msgs[1]["num_procs"], 2);
        assert_eq!(msgs[1]["num_complete"], 1);

        let keys: Vec<String> = fx.latest().await.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["g", "u2"]);
    }

    #[tokio::test]
    async fn drained_group_is_collected_and_goes_quiet() {
        let fx = Fixture::new();
        let mut rx = fx.listen().await;
        let p1 = fx.producer("g", "u1");
        let p2 = fx.producer("g", "u2");
        p1.queued("Queued").await.unwrap();
        p2.queued("Queued").await.unwrap();
        p1.failed("Error").await.unwrap();
        p2.finished("Done", None).await.unwrap();

        let last_summary = drain(&mut rx)
            .into_iter()
            .filter(|m| m["type"] == "progress_summary")
            .last()
            .unwrap();
        assert_eq!(last_summary["num_procs"], 2);
        assert_eq!(last_summary["num_complete"], 2);

        assert!(!fx.cache.exists("gid_g_started").await.unwrap());
        assert!(!fx.cache.exists("gid_g_done").await.unwrap());
        assert!(fx.latest().await.is_empty());

        p2.finished("Done again", None).await.unwrap();
        let after: Vec<Value> = drain(&mut rx);
        assert!(after.iter().all(|m| m["type"] != "progress_summary"));
        assert!(!fx.cache.exists("gid_g_started").await.unwrap());
        assert!(!fx.cache.exists("gid_g_done").await.unwrap());
    }

    #[tokio::test]
    async fn repeated_terminal_call_counts_once() {
        let fx = Fixture::new();
        let p1 = fx.producer("g", "u1");
        let p2 = fx.producer("g", "u2");
        p1.queued("Queued").await.unwrap();
        p2.queued("Queued").await.unwrap();

        p1.failed("Error").await.unwrap();
        p1.failed("Error").await.unwrap();

        assert_eq!(fx.cache.scard("gid_g_done").await.unwrap(), 1);
        assert_eq!(fx.cache.scard("gid_g_started").await.unwrap(), 2);
        let keys: Vec<String> = fx.latest().await.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["g", "u2"]);
    }

    #[tokio::test]
    async fn swid_records_heartbeat() {
        let fx = Fixture::new();
        let mut p = fx.producer("g", "u1");
        p.header.swid = Some("w7".to_string());
        p.progress("Uploading", 5).await.unwrap();
        let stamp = fx.cache.get("swid_w7").await.unwrap().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[tokio::test]
    async fn explicit_summary_collects_when_complete() {
        let fx = Fixture::new();
        let p = fx.producer("g", "u1");
        p.summary(4, 1).await.unwrap();
        assert_eq!(fx.latest().await.len(), 1);
        p.summary(4, 4).await.unwrap();
        assert!(fx.latest().await.is_empty());
    }
}
