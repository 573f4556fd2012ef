//! Job dispatch for Tator.
//!
//! This crate provides:
//! - [`DispatchScheduler`]: the `submit-jobs` loop that admits queued jobs
//!   onto live worker pods, subject to per-algorithm concurrency limits
//! - [`AdmissionPolicy`]: the pure FIFO selection rule
//! - Cluster API clients that list live worker pods
//! - Worker queue transports (Redis list or in-memory)
//! - [`WorkerRunner`]: the worker-side loop that pops, claims, runs,
//!   reports, and deletes jobs

pub mod clock;
pub mod cluster;
pub mod executor;
pub mod policy;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cluster::ClusterApi;
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use policy::AdmissionPolicy;
pub use progress::{HttpProgressReporter, ProgressReporter};
pub use queue::{WorkerQueue, WorkerQueueRegistry};
pub use runner::WorkerRunner;
pub use scheduler::{ChannelReport, DispatchScheduler};
