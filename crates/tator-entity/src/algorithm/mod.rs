//! Registered algorithms and their admission limits.

pub mod model;

pub use model::Algorithm;
