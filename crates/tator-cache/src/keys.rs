//! Cache key builders for all progress-related entries.
//!
//! Every process that reads or writes progress state (API replicas, the
//! scheduler, upload workers) must agree on these names.

use tator_core::types::ProjectId;
use tator_entity::progress::JobType;

// ── Group keys ─────────────────────────────────────────────

/// Pub/sub group name for one prefix within a project.
pub fn group(prefix: JobType, project: ProjectId) -> String {
    format!("{prefix}_{project}")
}

/// Hash holding the latest message per uid (and summary per gid) of a group.
pub fn latest(prefix: JobType, project: ProjectId) -> String {
    format!("{prefix}_latest_{project}")
}

// ── Job group sets ─────────────────────────────────────────

/// Set of uids that announced themselves in job group `gid`.
pub fn gid_started(gid: &str) -> String {
    format!("gid_{gid}_started")
}

/// Set of uids in job group `gid` that reached a terminal state.
pub fn gid_done(gid: &str) -> String {
    format!("gid_{gid}_done")
}

// ── Heartbeat keys ─────────────────────────────────────────

/// Last time the submitting worker `swid` reported progress.
pub fn swid_heartbeat(swid: &str) -> String {
    format!("swid_{swid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_and_latest_keys() {
        assert_eq!(group(JobType::Algorithm, ProjectId(4)), "algorithm_4");
        assert_eq!(latest(JobType::Upload, ProjectId(4)), "upload_latest_4");
        assert_eq!(latest(JobType::Download, ProjectId(12)), "download_latest_12");
    }

    #[test]
    fn gid_sets_are_distinct() {
        assert_eq!(gid_started("abc"), "gid_abc_started");
        assert_eq!(gid_done("abc"), "gid_abc_done");
        assert_ne!(gid_started("abc"), gid_done("abc"));
    }

    #[test]
    fn heartbeat_key() {
        assert_eq!(swid_heartbeat("w-1"), "swid_w-1");
    }
}
