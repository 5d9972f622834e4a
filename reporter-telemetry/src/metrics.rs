//! Prometheus metrics describing the reporters' own activity.
//!
//! These are registered into the same registry the reporters push, so each
//! reporter's health ends up next to the application metrics it ships.

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

#[derive(Debug, Clone)]
pub struct ReporterMetrics {
    pub reports: IntCounter,
    pub report_failures: IntCounter,
    pub points_written: IntCounter,
    pub report_duration: Histogram,
}

impl ReporterMetrics {
    /// Creates the metric set, labelled with `reporter = name`.
    pub fn new(name: &str) -> Result<Self, prometheus::Error> {
        let reports = IntCounter::with_opts(
            Opts::new("reporter_reports_total", "Completed metric pushes")
                .const_label("reporter", name),
        )?;
        let report_failures = IntCounter::with_opts(
            Opts::new("reporter_report_failures_total", "Failed metric pushes")
                .const_label("reporter", name),
        )?;
        let points_written = IntCounter::with_opts(
            Opts::new("reporter_points_written_total", "Points accepted by the sink")
                .const_label("reporter", name),
        )?;
        let report_duration = Histogram::with_opts(
            HistogramOpts::new(
                "reporter_report_duration_seconds",
                "Time spent snapshotting and pushing metrics",
            )
            .const_label("reporter", name)
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        Ok(Self {
            reports,
            report_failures,
            points_written,
            report_duration,
        })
    }

    /// Creates the metric set and registers it in `registry`.
    pub fn register(name: &str, registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::new(name)?;
        registry.register(Box::new(metrics.reports.clone()))?;
        registry.register(Box::new(metrics.report_failures.clone()))?;
        registry.register(Box::new(metrics.points_written.clone()))?;
        registry.register(Box::new(metrics.report_duration.clone()))?;
        Ok(metrics)
    }

    pub fn record_success(&self, points: usize, elapsed: Duration) {
        self.reports.inc();
        self.points_written.inc_by(points as u64);
        self.report_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.report_failures.inc();
        self.report_duration.observe(elapsed.as_secs_f64());
    }
}
