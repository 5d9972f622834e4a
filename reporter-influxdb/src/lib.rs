//! # InfluxDB Reporter
//!
//! Pushes a prometheus registry to the InfluxDB v1 write API.
//!
//! ### Components:
//! - `adapter`: enables a reporter from configuration, failing over across hosts
//! - `reporter`: scheduled snapshot + push loop
//! - `sender`: HTTP client bound to one endpoint (`http` feature)
//! - `line_protocol` / `snapshot`: registry to line protocol conversion
//! - `filter`: metric-name predicate

pub mod adapter;
pub mod error;
pub mod filter;
pub mod line_protocol;
pub mod reporter;
pub mod sender;
mod snapshot;

pub use adapter::InfluxDbReporterAdapter;
pub use error::ReporterError;
pub use filter::MetricFilter;
pub use reporter::{InfluxDbReporter, InfluxDbReporterBuilder};
pub use sender::{HttpSenderFactory, InfluxDbSender, SenderFactory, SenderSettings};

#[cfg(feature = "http")]
pub use sender::HttpSender;
