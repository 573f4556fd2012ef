//! Progress wire types exchanged between workers, the producer, and
//! subscribed clients.

pub mod kind;
pub mod message;

pub use kind::{JobType, ProgressState};
pub use message::{ProgressEvent, ProgressHeader, ProgressMessage, SummaryMessage};
