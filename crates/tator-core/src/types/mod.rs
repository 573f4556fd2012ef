//! Core type definitions used across the Tator workspace.

pub mod id;

pub use id::*;
