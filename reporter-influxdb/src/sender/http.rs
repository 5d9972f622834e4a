//! HTTP sender for the InfluxDB v1 write API.

use async_trait::async_trait;
use reporter_config::HostPort;
use reqwest::{Client, Url};
use tracing::{debug, trace};

use super::{InfluxDbSender, SenderSettings};
use crate::error::ReporterError;

/// Posts line protocol to `{protocol}://{host}:{port}/write`.
#[derive(Debug, Clone)]
pub struct HttpSender {
    endpoint: HostPort,
    write_url: Url,
    ping_url: Url,
    credentials: Option<(String, String)>,
    client: Client,
}

impl HttpSender {
    /// Builds the client and endpoint URLs. Does not touch the network.
    pub fn new(endpoint: HostPort, settings: &SenderSettings) -> Result<Self, ReporterError> {
        if settings.protocol != "http" && settings.protocol != "https" {
            return Err(ReporterError::UnsupportedProtocol(settings.protocol.clone()));
        }

        let base = format!("{}://{}", settings.protocol, endpoint);
        let base_url =
            Url::parse(&base).map_err(|e| ReporterError::InvalidEndpoint(format!("{base}: {e}")))?;

        let mut write_url = base_url
            .join("write")
            .map_err(|e| ReporterError::InvalidEndpoint(format!("{base}: {e}")))?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &settings.database)
            .append_pair("precision", settings.precision.precision());

        let ping_url = base_url
            .join("ping")
            .map_err(|e| ReporterError::InvalidEndpoint(format!("{base}: {e}")))?;

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.connect_timeout + settings.read_timeout)
            .build()?;

        Ok(Self {
            endpoint,
            write_url,
            ping_url,
            credentials: settings.credentials.clone(),
            client,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Checks that the server answers `/ping`.
    pub async fn ping(&self) -> Result<(), ReporterError> {
        let response = self.client.get(self.ping_url.clone()).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %self.endpoint, "InfluxDB ping succeeded");
            Ok(())
        } else {
            Err(ReporterError::Server {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl InfluxDbSender for HttpSender {
    async fn write(&self, lines: &str) -> Result<(), ReporterError> {
        let mut request = self
            .client
            .post(self.write_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(lines.to_owned());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!(endpoint = %self.endpoint, bytes = lines.len(), "Metrics written");
            Ok(())
        } else {
            Err(ReporterError::Server {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    fn endpoint(&self) -> &HostPort {
        &self.endpoint
    }
}
