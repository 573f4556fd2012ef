//! Dispatch loop configuration.

use serde::{Deserialize, Serialize};

/// Settings for the `submit-jobs` dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the dispatch loop inside the API server process.
    #[serde(default)]
    pub embedded: bool,
    /// Pause between two channel passes, in milliseconds.
    #[serde(default = "default_channel_interval")]
    pub channel_interval_ms: u64,
    /// Minimum age of the cached live-pod list before it is refreshed.
    #[serde(default = "default_pod_refresh")]
    pub pod_refresh_seconds: u64,
    /// A STARTED job on a dead pod is requeued once its `updated`
    /// timestamp is older than this.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    /// Routing for the algorithm-execution channel.
    #[serde(default = "default_algorithm_channel")]
    pub algorithm: ChannelRouting,
    /// Routing for the transcode channel.
    #[serde(default = "default_transcode_channel")]
    pub transcode: ChannelRouting,
    /// Routing for the package channel.
    #[serde(default = "default_package_channel")]
    pub package: ChannelRouting,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            embedded: false,
            channel_interval_ms: default_channel_interval(),
            pod_refresh_seconds: default_pod_refresh(),
            stale_after_seconds: default_stale_after(),
            algorithm: default_algorithm_channel(),
            transcode: default_transcode_channel(),
            package: default_package_channel(),
        }
    }
}

/// Where a channel's jobs go and which pods serve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRouting {
    /// Name of the worker queue the payloads are sent to.
    pub queue: String,
    /// Value of the `app` pod label carried by this channel's workers.
    pub app_label: String,
}

impl ChannelRouting {
    fn new(queue: &str, app_label: &str) -> Self {
        Self {
            queue: queue.to_string(),
            app_label: app_label.to_string(),
        }
    }
}

fn default_channel_interval() -> u64 {
    300
}

fn default_pod_refresh() -> u64 {
    60
}

fn default_stale_after() -> u64 {
    60
}

fn default_algorithm_channel() -> ChannelRouting {
    ChannelRouting::new("algorithm", "algorithm-worker")
}

fn default_transcode_channel() -> ChannelRouting {
    ChannelRouting::new("transcode", "transcode-worker")
}

fn default_package_channel() -> ChannelRouting {
    ChannelRouting::new("package", "package-worker")
}
