//! Reporter error types.

use thiserror::Error;

/// Errors raised while enabling, running or pushing through a reporter.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The sender implementation is not compiled into this build.
    #[error("sender implementation '{0}' is not available")]
    DependencyUnavailable(&'static str),

    /// The configuration yields no candidate host.
    #[error("no hosts configured")]
    NoHostsConfigured,

    /// Every candidate host failed.
    #[error("none of {attempted} configured hosts worked")]
    AllHostsFailed { attempted: usize },

    /// The write endpoint could not be built for a host.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("unsupported protocol '{0}'")]
    UnsupportedProtocol(String),

    /// Transport level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("invalid metric filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("reporting period must be greater than zero")]
    InvalidPeriod,

    #[error("reporter already started")]
    AlreadyStarted,

    /// `start` was called outside of a tokio runtime.
    #[error("no async runtime available to schedule the reporter")]
    NoRuntime,
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ReporterError {
    fn from(err: reqwest::Error) -> Self {
        ReporterError::Network(err.to_string())
    }
}
