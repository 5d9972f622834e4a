//! # Reporter Telemetry
//!
//! Logging setup and the reporters' own activity metrics.

pub mod logging;
pub mod metrics;

pub use metrics::ReporterMetrics;
