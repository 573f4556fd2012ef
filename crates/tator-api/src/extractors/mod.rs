//! Custom Axum extractors.

pub mod identity;
pub mod validated;

pub use identity::Identity;
pub use validated::{ValidatedJson, validation_error};
