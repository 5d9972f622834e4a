//! Binds an [`InfluxDbReporterConfig`] to a metrics registry.
//!
//! `enable` walks the configured hosts in order and keeps the first one for
//! which a sender can be built and a reporter started. The adapter holds at
//! most one reporter and never replaces it.

use std::collections::BTreeMap;
use std::sync::Arc;

use prometheus::Registry;
use reporter_config::{HostPort, InfluxDbReporterConfig};
use reporter_telemetry::ReporterMetrics;
use tracing::{debug, error, info, warn};

use crate::error::ReporterError;
use crate::filter::MetricFilter;
use crate::reporter::InfluxDbReporter;
use crate::sender::{HttpSenderFactory, SenderFactory, SenderSettings};

const HOST_TAG_NAME: &str = "host";

pub struct InfluxDbReporterAdapter {
    config: InfluxDbReporterConfig,
    factory: Arc<dyn SenderFactory>,
    metrics: Option<ReporterMetrics>,
    reporter: Option<InfluxDbReporter>,
}

impl InfluxDbReporterAdapter {
    /// Adapter using the HTTP sender.
    pub fn new(config: InfluxDbReporterConfig) -> Self {
        Self::with_sender_factory(config, Arc::new(HttpSenderFactory))
    }

    pub fn with_sender_factory(
        config: InfluxDbReporterConfig,
        factory: Arc<dyn SenderFactory>,
    ) -> Self {
        Self {
            config,
            factory,
            metrics: None,
            reporter: None,
        }
    }

    /// Self-metrics handed to the reporter once enabled.
    pub fn with_metrics(mut self, metrics: ReporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &InfluxDbReporterConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.reporter.is_some()
    }

    /// Host the running reporter pushes to.
    pub fn active_host(&self) -> Option<&HostPort> {
        self.reporter.as_ref().map(InfluxDbReporter::endpoint)
    }

    /// Starts reporting `registry` to the first working host.
    ///
    /// Returns `false` when the sender is unavailable, no host is configured
    /// or every host failed. Failures are logged, never returned.
    pub async fn enable(&mut self, registry: &Registry) -> bool {
        if let Some(reporter) = &self.reporter {
            debug!(endpoint = %reporter.endpoint(), "InfluxDB reporter already enabled");
            return true;
        }

        if !self.factory.is_available() {
            let err = ReporterError::DependencyUnavailable(self.factory.name());
            error!(error = %err, "Tried to enable InfluxDB reporter, but its sender was not found");
            return false;
        }

        let hosts = self.config.full_host_list();
        if hosts.is_empty() {
            error!(
                error = %ReporterError::NoHostsConfigured,
                "No hosts specified, cannot enable InfluxDB reporter"
            );
            return false;
        }

        let settings = SenderSettings::from(&self.config);
        let tag = self.host_tag().await;

        for host in &hosts {
            info!("Enabling InfluxDB reporter to {}", host);
            match self.start_reporter(host, registry, &settings, &tag).await {
                Ok(reporter) => {
                    self.reporter = Some(reporter);
                    return true;
                }
                Err(e) => {
                    error!(error = %e, "Failed to enable InfluxDB reporter for {}", host);
                }
            }
        }

        error!(
            error = %ReporterError::AllHostsFailed { attempted: hosts.len() },
            "None of configured InfluxDB reporter hosts worked"
        );
        false
    }

    /// Pushes one snapshot now. Does nothing until `enable` succeeded.
    pub async fn report(&self) {
        if let Some(reporter) = &self.reporter {
            reporter.report().await;
        }
    }

    /// Resolves the host tag. Resolver lookups run on the blocking pool.
    async fn host_tag(&self) -> String {
        if !self.config.tag_needs_lookup() {
            return self.config.resolved_tag();
        }
        let config = self.config.clone();
        match tokio::task::spawn_blocking(move || config.resolved_tag()).await {
            Ok(tag) => tag,
            Err(e) => {
                warn!(error = %e, "Host tag lookup failed, using the unresolved tag");
                self.config.tag.clone()
            }
        }
    }

    async fn start_reporter(
        &self,
        host: &HostPort,
        registry: &Registry,
        settings: &SenderSettings,
        tag: &str,
    ) -> Result<InfluxDbReporter, ReporterError> {
        let sender = self.factory.connect(host, settings).await?;

        let tags = BTreeMap::from([(HOST_TAG_NAME.to_string(), tag.to_string())]);
        let filter = MetricFilter::from_predicate(self.config.predicate.as_ref())?;

        let mut builder = InfluxDbReporter::for_registry(registry.clone())
            .convert_rates_to(self.config.rateunit)
            .convert_durations_to(self.config.durationunit)
            .precision(settings.precision)
            .with_tags(tags)
            .filter(filter);
        if let Some(metrics) = &self.metrics {
            builder = builder.with_metrics(metrics.clone());
        }

        let mut reporter = builder.build(sender);
        reporter.start(self.config.period_duration())?;
        Ok(reporter)
    }
}
