//! The `submit-jobs` dispatch loop.
//!
//! Each iteration visits every channel in turn:
//!
//! 1. refresh the channel's live pod list if the cached one is too old
//! 2. requeue STARTED jobs whose pod is gone and whose row went stale
//! 3. start as many queued jobs as there are idle pods, in FIFO order,
//!    respecting per-algorithm concurrency limits
//!
//! A job is persisted as STARTED before its payload is sent. If the send
//! fails the row stays STARTED with no pod, and step 2 puts it back in the
//! queue once it goes stale.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tator_core::config::AppConfig;
use tator_core::config::scheduler::{ChannelRouting, SchedulerConfig};
use tator_core::result::AppResult;
use tator_core::types::AlgorithmId;
use tator_database::store::{AlgorithmStore, JobStore};
use tator_entity::job::{DispatchedJob, Job, JobChannel, JobStatus};

use crate::clock::{Clock, SystemClock};
use crate::cluster::{ClusterApi, build_cluster_api};
use crate::policy::AdmissionPolicy;
use crate::queue::{WorkerQueueRegistry, build_worker_queue};

fn seconds(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(value.min(u64::from(u32::MAX)) as i64)
}

/// What one channel pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    /// Channel visited.
    pub channel: JobChannel,
    /// Live worker pods.
    pub live_pods: usize,
    /// STARTED jobs left after requeueing, before admission.
    pub started: usize,
    /// STARTED jobs moved back to QUEUED.
    pub requeued: usize,
    /// Jobs started and sent this pass.
    pub dispatched: usize,
}

#[derive(Debug, Clone)]
struct PodSnapshot {
    names: Vec<String>,
    fetched_at: DateTime<Utc>,
}

/// Admits queued jobs onto live worker pods.
#[derive(Debug)]
pub struct DispatchScheduler {
    jobs: Arc<dyn JobStore>,
    algorithms: Arc<dyn AlgorithmStore>,
    cluster: Arc<dyn ClusterApi>,
    queues: WorkerQueueRegistry,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    pods: Mutex<HashMap<JobChannel, PodSnapshot>>,
}

impl DispatchScheduler {
    /// Create a scheduler.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        algorithms: Arc<dyn AlgorithmStore>,
        cluster: Arc<dyn ClusterApi>,
        queues: WorkerQueueRegistry,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs,
            algorithms,
            cluster,
            queues,
            clock,
            config,
            pods: Mutex::new(HashMap::new()),
        }
    }

    /// Build a scheduler on the real clock, with the cluster API and worker
    /// queue transport named in `config`.
    pub async fn from_config(
        config: &AppConfig,
        jobs: Arc<dyn JobStore>,
        algorithms: Arc<dyn AlgorithmStore>,
    ) -> AppResult<Self> {
        let cluster = build_cluster_api(&config.cluster)?;
        let transport = build_worker_queue(&config.worker_queue).await?;
        let queues = WorkerQueueRegistry::from_config(&config.scheduler, transport);
        Ok(Self::new(
            jobs,
            algorithms,
            cluster,
            queues,
            Arc::new(SystemClock),
            config.scheduler.clone(),
        ))
    }

    fn routing(&self, channel: JobChannel) -> &ChannelRouting {
        match channel {
            JobChannel::Algorithm => &self.config.algorithm,
            JobChannel::Transcode => &self.config.transcode,
            JobChannel::Package => &self.config.package,
        }
    }

    fn stale_after(&self) -> chrono::Duration {
        seconds(self.config.stale_after_seconds)
    }

    fn pod_refresh(&self) -> chrono::Duration {
        seconds(self.config.pod_refresh_seconds)
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.config.channel_interval_ms,
            pod_refresh_s = self.config.pod_refresh_seconds,
            stale_after_s = self.config.stale_after_seconds,
            "Dispatch loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.run_iteration() => {}
            }
        }

        info!("Dispatch loop stopped");
    }

    /// One pass over every channel, pausing `channel_interval_ms` after
    /// each. A failing channel is logged and skipped until the next pass.
    pub async fn run_iteration(&self) -> Vec<ChannelReport> {
        let pause = Duration::from_millis(self.config.channel_interval_ms);
        let mut reports = Vec::with_capacity(JobChannel::ALL.len());

        for channel in JobChannel::ALL {
            match self.run_channel(channel).await {
                Ok(report) => {
                    if report.requeued > 0 || report.dispatched > 0 {
                        info!(
                            channel = %channel,
                            live_pods = report.live_pods,
                            started = report.started,
                            requeued = report.requeued,
                            dispatched = report.dispatched,
                            "Channel pass"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => error!(
                    channel = %channel,
                    transient = e.kind.is_transient(),
                    error = %e,
                    "Channel pass abandoned"
                ),
            }
            self.clock.sleep(pause).await;
        }

        reports
    }

    /// Refresh pods, requeue stale orphans, then admit jobs onto idle pods
    /// for one channel.
    pub async fn run_channel(&self, channel: JobChannel) -> AppResult<ChannelReport> {
        let live_pods = self.live_pods(channel).await?;
        let now = self.clock.now();

        let mut started = Vec::new();
        let mut requeued = 0;
        for job in self.jobs.list(Some(channel), Some(JobStatus::Started)).await? {
            if job.is_orphaned(&live_pods) && job.is_stale(now, self.stale_after()) {
                if self.jobs.requeue(job.id, now).await? {
                    warn!(
                        job_id = %job.id,
                        channel = %channel,
                        pod = job.pod_name.as_deref().unwrap_or("-"),
                        "Requeued job from dead pod"
                    );
                    requeued += 1;
                }
            } else {
                started.push(job);
            }
        }

        let still_started = started.len();
        let num_to_assign = live_pods.len().saturating_sub(still_started);
        let dispatched = if num_to_assign > 0 {
            self.admit(channel, num_to_assign, started).await?
        } else {
            0
        };

        Ok(ChannelReport {
            channel,
            live_pods: live_pods.len(),
            started: still_started,
            requeued,
            dispatched,
        })
    }

    async fn admit(
        &self,
        channel: JobChannel,
        slots: usize,
        mut started: Vec<Job>,
    ) -> AppResult<usize> {
        let mut queued = self.jobs.list(Some(channel), Some(JobStatus::Queued)).await?;
        if queued.is_empty() {
            return Ok(0);
        }

        let limits = if channel.is_rate_limited() {
            let ids: HashSet<AlgorithmId> = queued
                .iter()
                .chain(started.iter())
                .filter_map(Job::algorithm_id)
                .collect();
            let ids: Vec<AlgorithmId> = ids.into_iter().collect();
            self.algorithms.concurrency_limits(&ids).await?
        } else {
            HashMap::new()
        };

        let route = self.queues.route(channel)?;
        let mut dispatched = 0;

        while dispatched < slots {
            let Some(next) = AdmissionPolicy::select_next(channel, &queued, &started, &limits)
            else {
                debug!(channel = %channel, "No admissible job");
                break;
            };
            let job_id = next.id;
            let Some(index) = queued.iter().position(|j| j.id == job_id) else {
                break;
            };
            let mut job = queued.swap_remove(index);

            let now = self.clock.now();
            match self.jobs.mark_started(job.id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(job_id = %job.id, "Job left the queue before it could start");
                    continue;
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed to mark job started");
                    break;
                }
            }
            job.status = JobStatus::Started;
            job.pod_name = None;
            job.updated = now;

            match serde_json::to_string(&DispatchedJob::from_job(&job)) {
                Ok(payload) => match route.send(&payload).await {
                    Ok(()) => info!(job_id = %job.id, channel = %channel, queue = %route.queue, "Dispatched job"),
                    Err(e) => error!(
                        job_id = %job.id,
                        queue = %route.queue,
                        error = %e,
                        "Failed to send job to worker queue"
                    ),
                },
                Err(e) => error!(job_id = %job.id, error = %e, "Failed to encode job payload"),
            }

            started.push(job);
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Live pods serving `channel`, refreshed from the cluster once the
    /// cached list is older than `pod_refresh_seconds`.
    pub async fn live_pods(&self, channel: JobChannel) -> AppResult<Vec<String>> {
        let now = self.clock.now();
        let mut pods = self.pods.lock().await;
        if let Some(snapshot) = pods.get(&channel) {
            if now - snapshot.fetched_at < self.pod_refresh() {
                return Ok(snapshot.names.clone());
            }
        }

        let label = &self.routing(channel).app_label;
        let names = self.cluster.list_pod_names(label).await?;
        debug!(channel = %channel, app = %label, pods = names.len(), "Refreshed live pods");
        pods.insert(
            channel,
            PodSnapshot {
                names: names.clone(),
                fetched_at: now,
            },
        );
        Ok(names)
    }
}
