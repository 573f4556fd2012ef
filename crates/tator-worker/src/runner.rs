//! Worker runner: the loop inside a worker pod.
//!
//! Pops dispatched payloads off its channel's queue, claims the job row
//! with the pod name, runs the job, reports how it ended, and deletes the
//! row. A transient failure puts the job back in the queue instead.
//!
//! Store writes after a job has run are retried. If the row still cannot
//! be deleted its claim is released, since a STARTED row on a live pod is
//! never reclaimed by the scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tator_core::result::AppResult;
use tator_core::types::JobId;
use tator_database::store::JobStore;
use tator_entity::job::{DispatchedJob, JobChannel};
use tator_entity::progress::ProgressState;

use crate::clock::Clock;
use crate::executor::{JobExecutionError, JobExecutor};
use crate::progress::{ProgressReporter, ProgressTarget, TerminalReport};
use crate::queue::registry::QueueRoute;

/// Attempts per store write or progress report once a job has run.
const SETTLE_ATTEMPTS: u32 = 3;
/// Pause before the second attempt; doubled after that.
const SETTLE_BACKOFF: Duration = Duration::from_millis(250);

/// What happened to one popped payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran to completion.
    Completed,
    /// Failed for good.
    Failed,
    /// Failed transiently; handed back to the queue.
    Requeued,
    /// Row was gone, no longer STARTED, or unreadable; nothing ran.
    Skipped,
    /// Payload could not be decoded; dropped.
    Rejected,
}

/// Pulls jobs for one channel on behalf of one pod.
#[derive(Debug)]
pub struct WorkerRunner {
    channel: JobChannel,
    pod_name: String,
    route: QueueRoute,
    jobs: Arc<dyn JobStore>,
    executor: Arc<JobExecutor>,
    clock: Arc<dyn Clock>,
    reporter: Option<Arc<dyn ProgressReporter>>,
    pop_timeout: Duration,
}

impl WorkerRunner {
    /// Create a runner for `channel` reading from `route`.
    pub fn new(
        channel: JobChannel,
        pod_name: impl Into<String>,
        route: QueueRoute,
        jobs: Arc<dyn JobStore>,
        executor: Arc<JobExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channel,
            pod_name: pod_name.into(),
            route,
            jobs,
            executor,
            clock,
            reporter: None,
            pop_timeout: Duration::from_secs(5),
        }
    }

    /// How long one pop blocks on an empty queue.
    pub fn with_pop_timeout(mut self, timeout: Duration) -> Self {
        self.pop_timeout = timeout;
        self
    }

    /// Send `failed`/`finished` through `reporter` before a row is deleted.
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Run until `shutdown` is cancelled. A job already running is
    /// finished before returning.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            channel = %self.channel,
            pod = %self.pod_name,
            queue = %self.route.queue,
            reports_progress = self.reporter.is_some(),
            "Worker started"
        );

        loop {
            let popped = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.route.transport.pop(&self.route.queue, self.pop_timeout) => popped,
            };

            match popped {
                Ok(Some(payload)) => {
                    self.process(&payload).await;
                }
                Ok(None) => debug!(queue = %self.route.queue, "Queue idle"),
                Err(e) => {
                    error!(queue = %self.route.queue, error = %e, "Failed to pop from worker queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.clock.sleep(self.pop_timeout) => {}
                    }
                }
            }
        }

        info!(channel = %self.channel, pod = %self.pod_name, "Worker stopped");
    }

    /// Handle one raw payload end to end. The outcome is that of the job
    /// itself; bookkeeping failures afterwards are logged.
    pub async fn process(&self, payload: &str) -> RunOutcome {
        let job: DispatchedJob = match serde_json::from_str(payload) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Dropping undecodable payload");
                return RunOutcome::Rejected;
            }
        };

        match self.jobs.claim(job.job_id, &self.pod_name, self.clock.now()).await {
            Ok(true) => info!(job_id = %job.job_id, pod = %self.pod_name, "Claimed job"),
            Ok(false) => {
                warn!(job_id = %job.job_id, "Job no longer started; skipping");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "Failed to claim job; skipping");
                return RunOutcome::Skipped;
            }
        }

        match self.executor.execute(self.channel, &job).await {
            Ok(result) => {
                info!(job_id = %job.job_id, "Job completed");
                let aux = match result {
                    Some(Value::Object(map)) => Some(map),
                    _ => None,
                };
                self.report(&job, ProgressState::Finished, "Job complete".to_string(), aux)
                    .await;
                self.remove(job.job_id).await;
                RunOutcome::Completed
            }
            Err(JobExecutionError::Transient(msg)) => {
                warn!(job_id = %job.job_id, reason = %msg, "Job failed transiently; requeueing");
                self.requeue(&job, msg).await
            }
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "Job failed");
                self.report(&job, ProgressState::Failed, err.to_string(), None)
                    .await;
                self.remove(job.job_id).await;
                RunOutcome::Failed
            }
        }
    }

    async fn requeue(&self, job: &DispatchedJob, reason: String) -> RunOutcome {
        let jobs = &self.jobs;
        let clock = &self.clock;
        let id = job.job_id;
        match self
            .settle("requeue", id, move || jobs.requeue(id, clock.now()))
            .await
        {
            Ok(true) => RunOutcome::Requeued,
            Ok(false) => {
                warn!(job_id = %id, "Job row left STARTED before it could be requeued");
                self.report(job, ProgressState::Failed, reason, None).await;
                self.remove(id).await;
                RunOutcome::Failed
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Could not requeue job; it stays claimed by this pod");
                RunOutcome::Requeued
            }
        }
    }

    async fn report(
        &self,
        job: &DispatchedJob,
        state: ProgressState,
        message: String,
        aux: Option<serde_json::Map<String, Value>>,
    ) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        let Some(target) = ProgressTarget::from_job(self.channel, job) else {
            debug!(job_id = %job.job_id, "Payload names no project; outcome not reported");
            return;
        };
        let report = TerminalReport {
            target,
            state,
            message,
            aux,
        };
        let report = &report;
        if let Err(e) = self
            .settle("report progress", job.job_id, move || reporter.report(report))
            .await
        {
            warn!(job_id = %job.job_id, error = %e, "Outcome not reported to subscribers");
        }
    }

    /// Delete the row; if that keeps failing, hand it back to the queue so
    /// the pod slot and algorithm slot are freed.
    async fn remove(&self, id: JobId) {
        let jobs = &self.jobs;
        let Err(e) = self.settle("delete", id, move || jobs.delete(id)).await else {
            return;
        };
        error!(job_id = %id, error = %e, "Failed to delete job row; releasing claim");
        match self.jobs.requeue(id, self.clock.now()).await {
            Ok(true) => warn!(job_id = %id, "Claim released; job will be dispatched again"),
            Ok(false) => {}
            Err(e) => error!(
                job_id = %id,
                error = %e,
                "Failed to release claim; row stays STARTED until this pod goes away"
            ),
        }
    }

    async fn settle<T, F, Fut>(&self, action: &'static str, id: JobId, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut backoff = SETTLE_BACKOFF;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < SETTLE_ATTEMPTS => {
                    warn!(job_id = %id, action, attempt, error = %e, "Retrying");
                    self.clock.sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
