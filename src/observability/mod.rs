// Observability: metrics and logging

pub mod metrics;

// Re-export main functions for ease of use
pub use crate::logging::init_logging;
pub use metrics::{init_metrics, render};
