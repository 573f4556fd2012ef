//! Admission rule: which queued job runs next.

use std::collections::HashMap;

use tator_core::types::AlgorithmId;
use tator_entity::job::{Job, JobChannel};

/// FIFO admission with a per-algorithm concurrency cap on rate-limited
/// channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdmissionPolicy;

impl AdmissionPolicy {
    /// Pick the next job to start on `channel`.
    ///
    /// `queued` are the channel's QUEUED jobs and `started` its STARTED
    /// jobs. On a rate-limited channel a candidate is skipped while the
    /// STARTED jobs of its algorithm number `limits[algorithm]` or more.
    /// Jobs whose algorithm is missing or has no entry in `limits` are not
    /// capped. Among the remaining candidates the earliest `submitted`
    /// wins, ties going to the lower id.
    pub fn select_next<'a>(
        channel: JobChannel,
        queued: &'a [Job],
        started: &[Job],
        limits: &HashMap<AlgorithmId, usize>,
    ) -> Option<&'a Job> {
        let running = if channel.is_rate_limited() {
            Self::running_per_algorithm(started)
        } else {
            HashMap::new()
        };

        queued
            .iter()
            .filter(|job| job.channel == channel)
            .filter(|job| {
                if !channel.is_rate_limited() {
                    return true;
                }
                match job.algorithm_id().and_then(|a| limits.get(&a).map(|l| (a, *l))) {
                    Some((algorithm, limit)) => {
                        running.get(&algorithm).copied().unwrap_or(0) < limit
                    }
                    None => true,
                }
            })
            .min_by_key(|job| job.fifo_key())
    }

    /// STARTED job count per algorithm.
    pub fn running_per_algorithm(started: &[Job]) -> HashMap<AlgorithmId, usize> {
        let mut running = HashMap::new();
        for algorithm in started.iter().filter_map(Job::algorithm_id) {
            *running.entry(algorithm).or_insert(0) += 1;
        }
        running
    }
}
