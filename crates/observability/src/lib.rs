//! Tracing and logging setup shared by binaries and test harnesses.

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use crate::tracing::{init, init_for_tests, init_with_filter};
