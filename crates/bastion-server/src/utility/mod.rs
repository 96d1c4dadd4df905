//! Utility modules for common functionality across the crate.

pub mod tracing_targets;

pub use tracing_targets::*;
