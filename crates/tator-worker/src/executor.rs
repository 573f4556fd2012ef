//! Job executor: dispatches popped payloads to registered handlers.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use tator_core::error::AppError;
use tator_entity::job::{DispatchedJob, JobChannel};

/// Runs the jobs of one channel.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Channel this handler serves.
    fn channel(&self) -> JobChannel;

    /// Run the job. Progress reporting is up to the handler.
    async fn execute(&self, job: &DispatchedJob) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job cannot succeed; its row is deleted.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// The job may succeed later; its row goes back to the queue.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Infrastructure failure while running the job.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Maps each channel to its handler.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<JobChannel, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// An executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its channel, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let channel = handler.channel();
        info!(channel = %channel, "Registered job handler");
        self.handlers.insert(channel, handler);
    }

    /// Whether `channel` has a handler.
    pub fn has_handler(&self, channel: JobChannel) -> bool {
        self.handlers.contains_key(&channel)
    }

    /// Run `job` with the handler for `channel`.
    pub async fn execute(
        &self,
        channel: JobChannel,
        job: &DispatchedJob,
    ) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&channel).ok_or_else(|| {
            JobExecutionError::Permanent(format!("No handler registered for channel '{channel}'"))
        })?;

        debug!(job_id = %job.job_id, channel = %channel, "Executing job");
        handler.execute(job).await
    }
}

/// Runs the argv in the payload's `command` field as a child process.
///
/// A non-zero exit is a permanent failure; failing to spawn is transient.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    channel: JobChannel,
}

impl CommandHandler {
    /// A handler serving `channel`.
    pub fn new(channel: JobChannel) -> Self {
        Self { channel }
    }

    fn argv(job: &DispatchedJob) -> Result<Vec<String>, JobExecutionError> {
        let Some(Value::Array(items)) = job.params.get("command") else {
            return Err(JobExecutionError::Permanent(
                "Payload has no `command` array".to_string(),
            ));
        };
        let argv: Option<Vec<String>> = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        match argv {
            Some(argv) if !argv.is_empty() => Ok(argv),
            _ => Err(JobExecutionError::Permanent(
                "`command` must be a non-empty array of strings".to_string(),
            )),
        }
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    fn channel(&self) -> JobChannel {
        self.channel
    }

    async fn execute(&self, job: &DispatchedJob) -> Result<Option<Value>, JobExecutionError> {
        let argv = Self::argv(job)?;
        let output = tokio::process::Command::new(&argv[0])
            .args(&argv[1..])
            .env("TATOR_JOB_ID", job.job_id.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Failed to start {}: {e}", argv[0])))?;

        if output.status.success() {
            Ok(Some(serde_json::json!({
                "exit_code": output.status.code(),
                "stdout": String::from_utf8_lossy(&output.stdout).trim_end(),
            })))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(JobExecutionError::Permanent(format!(
                "{} exited with {}: {}",
                argv[0],
                output.status,
                stderr.trim_end()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tator_core::types::JobId;

    fn payload(params: Value) -> DispatchedJob {
        let Value::Object(params) = params else {
            panic!("object expected");
        };
        DispatchedJob {
            job_id: JobId(5),
            params,
        }
    }

    #[tokio::test]
    async fn unregistered_channel_is_permanent() {
        let executor = JobExecutor::new();
        let err = executor
            .execute(JobChannel::Package, &payload(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }

    #[tokio::test]
    async fn command_handler_runs_argv() {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(CommandHandler::new(JobChannel::Algorithm)));
        assert!(executor.has_handler(JobChannel::Algorithm));

        let result = executor
            .execute(
                JobChannel::Algorithm,
                &payload(json!({ "command": ["sh", "-c", "echo $TATOR_JOB_ID"] })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["stdout"], "5");
        assert_eq!(result["exit_code"], 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_permanent() {
        let handler = CommandHandler::new(JobChannel::Transcode);
        let err = handler
            .execute(&payload(json!({ "command": ["sh", "-c", "echo boom >&2; exit 3"] })))
            .await
            .unwrap_err();
        match err {
            JobExecutionError::Permanent(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_transient() {
        let handler = CommandHandler::new(JobChannel::Transcode);
        let err = handler
            .execute(&payload(json!({ "command": ["/nonexistent/tator-tool"] })))
            .await
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::Transient(_)));
    }

    #[tokio::test]
    async fn malformed_command_is_permanent() {
        let handler = CommandHandler::new(JobChannel::Transcode);
        for params in [json!({}), json!({ "command": [] }), json!({ "command": [1, 2] })] {
            let err = handler.execute(&payload(params)).await.unwrap_err();
            assert!(matches!(err, JobExecutionError::Permanent(_)));
        }
    }
}
