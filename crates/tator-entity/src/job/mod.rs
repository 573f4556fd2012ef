//! Queued and running job entities.

pub mod channel;
pub mod model;
pub mod payload;
pub mod status;

pub use channel::JobChannel;
pub use model::{CreateJob, Job};
pub use payload::DispatchedJob;
pub use status::JobStatus;
