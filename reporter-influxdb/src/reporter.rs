//! Scheduled reporter pushing registry snapshots through a sender.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use prometheus::Registry;
use reporter_config::{HostPort, TimeUnit};
use reporter_telemetry::ReporterMetrics;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ReporterError;
use crate::filter::MetricFilter;
use crate::line_protocol;
use crate::sender::InfluxDbSender;
use crate::snapshot::SnapshotConverter;

/// Builder returned by [`InfluxDbReporter::for_registry`].
pub struct InfluxDbReporterBuilder {
    registry: Registry,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    precision: Option<TimeUnit>,
    tags: BTreeMap<String, String>,
    filter: MetricFilter,
    metrics: Option<ReporterMetrics>,
}

impl InfluxDbReporterBuilder {
    pub fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Timestamp precision. Defaults to the rate unit.
    pub fn precision(mut self, unit: TimeUnit) -> Self {
        self.precision = Some(unit);
        self
    }

    /// Tags attached to every point.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn filter(mut self, filter: MetricFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Records push outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: ReporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self, sender: Arc<dyn InfluxDbSender>) -> InfluxDbReporter {
        let precision = self.precision.unwrap_or(self.rate_unit);
        InfluxDbReporter {
            inner: Arc::new(Inner {
                registry: self.registry,
                converter: SnapshotConverter::new(
                    self.rate_unit,
                    self.duration_unit,
                    precision,
                    self.tags,
                    self.filter,
                ),
                sender,
                metrics: self.metrics,
            }),
            task: None,
        }
    }
}

/// Periodically pushes one registry to one sender.
///
/// The background task is aborted on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct InfluxDbReporter {
    inner: Arc<Inner>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    registry: Registry,
    converter: SnapshotConverter,
    sender: Arc<dyn InfluxDbSender>,
    metrics: Option<ReporterMetrics>,
}

impl fmt::Debug for InfluxDbReporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbReporterBuilder")
            .field("rate_unit", &self.rate_unit)
            .field("duration_unit", &self.duration_unit)
            .field("precision", &self.precision)
            .field("tags", &self.tags)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("converter", &self.converter)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl InfluxDbReporter {
    pub fn for_registry(registry: Registry) -> InfluxDbReporterBuilder {
        InfluxDbReporterBuilder {
            registry,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            precision: None,
            tags: BTreeMap::new(),
            filter: MetricFilter::all(),
            metrics: None,
        }
    }

    /// Starts reporting every `period` on the current tokio runtime. The
    /// first push happens one period from now.
    pub fn start(&mut self, period: Duration) -> Result<(), ReporterError> {
        if period.is_zero() {
            return Err(ReporterError::InvalidPeriod);
        }
        if self.task.is_some() {
            return Err(ReporterError::AlreadyStarted);
        }
        let handle = Handle::try_current().map_err(|_| ReporterError::NoRuntime)?;
        let first_tick = tokio::time::Instant::now()
            .checked_add(period)
            .ok_or(ReporterError::InvalidPeriod)?;

        let inner = Arc::clone(&self.inner);
        self.task = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                inner.report().await;
            }
        }));

        info!(
            endpoint = %self.inner.sender.endpoint(),
            period_ms = period.as_millis() as u64,
            "InfluxDB reporter started"
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(endpoint = %self.inner.sender.endpoint(), "InfluxDB reporter stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    pub fn endpoint(&self) -> &HostPort {
        self.inner.sender.endpoint()
    }

    /// Pushes one snapshot now. Failures are logged and swallowed.
    pub async fn report(&self) {
        self.inner.report().await
    }

    /// Pushes one snapshot now and returns the number of points written.
    pub async fn try_report(&self) -> Result<usize, ReporterError> {
        self.inner.try_report().await
    }
}

impl Drop for InfluxDbReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn report(&self) {
        if let Err(e) = self.try_report().await {
            warn!(
                endpoint = %self.sender.endpoint(),
                error = %e,
                "Unable to report to InfluxDB, discarding metrics"
            );
        }
    }

    async fn try_report(&self) -> Result<usize, ReporterError> {
        let started = Instant::now();
        let families = self.registry.gather();
        let unix_nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let points = self.converter.convert(&families, started, unix_nanos);

        let result = if points.is_empty() {
            Ok(())
        } else {
            self.sender.write(&line_protocol::encode(&points)).await
        };

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(()) => metrics.record_success(points.len(), started.elapsed()),
                Err(_) => metrics.record_failure(started.elapsed()),
            }
        }
        result.map(|()| points.len())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use prometheus::IntGauge;

    use super::*;

    #[derive(Debug)]
    struct RecordingSender {
        endpoint: HostPort,
        payloads: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSender {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                endpoint: HostPort::new("good.host", 2),
                payloads: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl InfluxDbSender for RecordingSender {
        async fn write(&self, lines: &str) -> Result<(), ReporterError> {
            self.payloads.lock().push(lines.to_string());
            if self.fail {
                Err(ReporterError::Server {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }

        fn endpoint(&self) -> &HostPort {
            &self.endpoint
        }
    }

    fn registry_with_gauge() -> Registry {
        let registry = Registry::new();
        let gauge = IntGauge::new("queue_depth", "depth").unwrap();
        gauge.set(3);
        registry.register(Box::new(gauge)).unwrap();
        registry
    }

    fn tags() -> BTreeMap<String, String> {
        BTreeMap::from([("host".to_string(), "web-01".to_string())])
    }

    #[tokio::test]
    async fn report_pushes_tagged_points() {
        let sender = RecordingSender::new(false);
        let reporter = InfluxDbReporter::for_registry(registry_with_gauge())
            .with_tags(tags())
            .build(sender.clone());

        assert_eq!(reporter.try_report().await.unwrap(), 1);
        let payloads = sender.payloads.lock();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].starts_with("queue_depth,host=web-01 value=3 "));
    }

    #[tokio::test]
    async fn empty_snapshot_is_not_sent() {
        let sender = RecordingSender::new(false);
        let reporter = InfluxDbReporter::for_registry(Registry::new()).build(sender.clone());
        assert_eq!(reporter.try_report().await.unwrap(), 0);
        assert!(sender.payloads.lock().is_empty());
    }

    #[tokio::test]
    async fn self_metrics_track_outcomes() {
        let registry = registry_with_gauge();
        let metrics = ReporterMetrics::new("test").unwrap();

        let ok = InfluxDbReporter::for_registry(registry.clone())
            .with_metrics(metrics.clone())
            .build(RecordingSender::new(false));
        ok.report().await;

        let failing = InfluxDbReporter::for_registry(registry)
            .with_metrics(metrics.clone())
            .build(RecordingSender::new(true));
        failing.report().await;

        assert_eq!(metrics.reports.get(), 1);
        assert_eq!(metrics.points_written.get(), 1);
        assert_eq!(metrics.report_failures.get(), 1);
    }

    #[tokio::test]
    async fn start_rejects_zero_period_and_restart() {
        let mut reporter =
            InfluxDbReporter::for_registry(Registry::new()).build(RecordingSender::new(false));
        assert!(matches!(
            reporter.start(Duration::ZERO),
            Err(ReporterError::InvalidPeriod)
        ));

        reporter.start(Duration::from_secs(60)).unwrap();
        assert!(reporter.is_started());
        assert!(matches!(
            reporter.start(Duration::from_secs(60)),
            Err(ReporterError::AlreadyStarted)
        ));

        reporter.stop();
        assert!(!reporter.is_started());
    }

    #[test]
    fn start_requires_runtime() {
        let mut reporter =
            InfluxDbReporter::for_registry(Registry::new()).build(RecordingSender::new(false));
        assert!(matches!(
            reporter.start(Duration::from_secs(1)),
            Err(ReporterError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_reports_every_period() {
        let sender = RecordingSender::new(false);
        let mut reporter =
            InfluxDbReporter::for_registry(registry_with_gauge()).build(sender.clone());
        reporter.start(Duration::from_secs(10)).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sender.payloads.lock().len(), 0);

        tokio::time::sleep(Duration::from_secs(26)).await;
        assert_eq!(sender.payloads.lock().len(), 3);

        reporter.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sender.payloads.lock().len(), 3);
    }
}
