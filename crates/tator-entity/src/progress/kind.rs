//! Progress prefixes and states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The family of work a progress message describes. Each family has its
/// own pub/sub group and replay hash per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Algorithm runs.
    Algorithm,
    /// Media uploads and their transcodes.
    Upload,
    /// Download packaging.
    Download,
}

impl JobType {
    /// Every prefix a subscriber joins per project.
    pub const ALL: [JobType; 3] = [Self::Algorithm, Self::Upload, Self::Download];

    /// Return the prefix string used in group names and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "algorithm" => Ok(Self::Algorithm),
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            other => Err(format!("unknown job type '{other}'")),
        }
    }
}

/// State carried by a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    /// Accepted but not yet running.
    Queued,
    /// Running.
    Started,
    /// Ended with an error.
    Failed,
    /// Ended successfully.
    Finished,
}
