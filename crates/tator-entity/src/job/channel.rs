//! Worker pool routing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The worker pool a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_channel", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobChannel {
    /// Algorithm execution; subject to per-algorithm concurrency limits.
    Algorithm,
    /// Media transcoding.
    Transcode,
    /// Archive packaging for downloads.
    Package,
}

impl JobChannel {
    /// Every channel, in dispatch order.
    pub const ALL: [JobChannel; 3] = [Self::Algorithm, Self::Transcode, Self::Package];

    /// Return the channel as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::Transcode => "transcode",
            Self::Package => "package",
        }
    }

    /// Whether queued jobs on this channel are limited by their
    /// algorithm's `max_concurrent`.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Algorithm)
    }
}

impl fmt::Display for JobChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "algorithm" => Ok(Self::Algorithm),
            "transcode" => Ok(Self::Transcode),
            "package" => Ok(Self::Package),
            other => Err(format!("unknown job channel '{other}'")),
        }
    }
}
