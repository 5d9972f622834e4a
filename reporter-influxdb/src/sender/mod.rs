//! Senders deliver encoded points to one InfluxDB endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reporter_config::{HostPort, InfluxDbReporterConfig, TimeUnit};

use crate::error::ReporterError;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpSender;

/// Client bound to exactly one remote endpoint.
#[async_trait]
pub trait InfluxDbSender: Send + Sync + std::fmt::Debug {
    /// Writes a line protocol payload.
    async fn write(&self, lines: &str) -> Result<(), ReporterError>;

    /// The endpoint this sender is bound to.
    fn endpoint(&self) -> &HostPort;
}

/// Builds senders for candidate hosts.
#[async_trait]
pub trait SenderFactory: Send + Sync {
    /// Whether the sender implementation is present in this build.
    fn is_available(&self) -> bool;

    /// Short name of the implementation, used in log messages.
    fn name(&self) -> &'static str;

    async fn connect(
        &self,
        host: &HostPort,
        settings: &SenderSettings,
    ) -> Result<Arc<dyn InfluxDbSender>, ReporterError>;
}

/// Connection parameters shared by every candidate host.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderSettings {
    pub protocol: String,
    pub database: String,
    pub credentials: Option<(String, String)>,
    pub precision: TimeUnit,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub ping_on_connect: bool,
}

impl From<&InfluxDbReporterConfig> for SenderSettings {
    fn from(config: &InfluxDbReporterConfig) -> Self {
        Self {
            protocol: config.protocol.to_ascii_lowercase(),
            database: config.db_name.clone(),
            credentials: config
                .credentials()
                .map(|(user, password)| (user.to_string(), password.to_string())),
            precision: config.rateunit,
            connect_timeout: config.connection_timeout_duration(),
            read_timeout: config.read_timeout_duration(),
            ping_on_connect: config.ping_on_connect,
        }
    }
}

/// Factory for [`HttpSender`]s. Only available with the `http` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpSenderFactory;

#[async_trait]
impl SenderFactory for HttpSenderFactory {
    fn is_available(&self) -> bool {
        cfg!(feature = "http")
    }

    fn name(&self) -> &'static str {
        "http"
    }

    #[cfg(feature = "http")]
    async fn connect(
        &self,
        host: &HostPort,
        settings: &SenderSettings,
    ) -> Result<Arc<dyn InfluxDbSender>, ReporterError> {
        let sender = HttpSender::new(host.clone(), settings)?;
        if settings.ping_on_connect {
            sender.ping().await?;
        }
        Ok(Arc::new(sender))
    }

    #[cfg(not(feature = "http"))]
    async fn connect(
        &self,
        _host: &HostPort,
        _settings: &SenderSettings,
    ) -> Result<Arc<dyn InfluxDbSender>, ReporterError> {
        Err(ReporterError::DependencyUnavailable(self.name()))
    }
}
