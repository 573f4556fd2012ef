//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use tator_entity::job::Job;
use tator_worker::ChannelReport;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a single row in the selected format
pub fn print_item<T: Serialize + Tabled>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", Table::new(std::slice::from_ref(item))),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// One job as a table row.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct JobRow {
    /// Job id
    #[tabled(rename = "ID")]
    pub id: i64,
    /// Channel
    #[tabled(rename = "Channel")]
    pub channel: String,
    /// Status
    #[tabled(rename = "Status")]
    pub status: String,
    /// Claiming pod
    #[tabled(rename = "Pod")]
    pub pod_name: String,
    /// Submission time
    #[tabled(rename = "Submitted")]
    pub submitted: String,
    /// Last update
    #[tabled(rename = "Updated")]
    pub updated: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.get(),
            channel: job.channel.to_string(),
            status: job.status.to_string(),
            pod_name: job.pod_name.clone().unwrap_or_else(|| "-".to_string()),
            submitted: job.submitted.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated: job.updated.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Per-channel counts.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ChannelStatusRow {
    /// Channel
    #[tabled(rename = "Channel")]
    pub channel: String,
    /// QUEUED rows
    #[tabled(rename = "Queued")]
    pub queued: u64,
    /// STARTED rows
    #[tabled(rename = "Started")]
    pub started: u64,
    /// Payloads waiting on the worker queue
    #[tabled(rename = "Queue Depth")]
    pub queue_depth: String,
}

/// One dispatch pass over a channel.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ReportRow {
    /// Channel
    #[tabled(rename = "Channel")]
    pub channel: String,
    /// Live pods
    #[tabled(rename = "Pods")]
    pub live_pods: usize,
    /// STARTED after requeue
    #[tabled(rename = "Started")]
    pub started: usize,
    /// Requeued this pass
    #[tabled(rename = "Requeued")]
    pub requeued: usize,
    /// Dispatched this pass
    #[tabled(rename = "Dispatched")]
    pub dispatched: usize,
}

impl From<&ChannelReport> for ReportRow {
    fn from(report: &ChannelReport) -> Self {
        Self {
            channel: report.channel.to_string(),
            live_pods: report.live_pods,
            started: report.started,
            requeued: report.requeued,
            dispatched: report.dispatched,
        }
    }
}
