//! Conversion of a prometheus registry snapshot into line protocol points.
//!
//! - counter: `count`, plus `rate` per rate unit from the second snapshot on
//! - gauge / untyped: `value`
//! - histogram: `count`, `sum`, `mean`, `p50`, `p75`, `p95`, `p99`
//! - summary: `count`, `sum`, `mean`, one `p<q>` per exported quantile
//!
//! Families named `*_seconds` hold durations and are converted to the
//! duration unit.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use parking_lot::Mutex;
use prometheus::proto::{Bucket, Metric, MetricFamily, MetricType};
use reporter_config::TimeUnit;

use crate::filter::MetricFilter;
use crate::line_protocol::Point;

const HISTOGRAM_PERCENTILES: [(&str, f64); 4] =
    [("p50", 0.50), ("p75", 0.75), ("p95", 0.95), ("p99", 0.99)];

#[derive(Debug)]
pub(crate) struct SnapshotConverter {
    pub(crate) rate_unit: TimeUnit,
    pub(crate) duration_unit: TimeUnit,
    pub(crate) precision: TimeUnit,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) filter: MetricFilter,
    /// Last seen counter value per series, for rate computation.
    last_counts: Mutex<HashMap<String, (f64, Instant)>>,
}

impl SnapshotConverter {
    pub(crate) fn new(
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
        precision: TimeUnit,
        tags: BTreeMap<String, String>,
        filter: MetricFilter,
    ) -> Self {
        Self {
            rate_unit,
            duration_unit,
            precision,
            tags,
            filter,
            last_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Converts every family accepted by the filter. `now` drives rate
    /// computation, `unix_nanos` the point timestamps.
    pub(crate) fn convert(
        &self,
        families: &[MetricFamily],
        now: Instant,
        unix_nanos: i64,
    ) -> Vec<Point> {
        let timestamp = self.precision.timestamp(unix_nanos);
        let mut points = Vec::new();

        for family in families {
            let name = family.get_name();
            if !self.filter.matches(name) {
                continue;
            }
            let is_duration = name.ends_with("_seconds");

            for metric in family.get_metric() {
                let base = self.base_point(name, metric).timestamp(timestamp);
                let point = match family.get_field_type() {
                    MetricType::COUNTER => self.counter(base, name, metric, now),
                    MetricType::GAUGE => base.field(
                        "value",
                        self.scale(metric.get_gauge().get_value(), is_duration),
                    ),
                    MetricType::UNTYPED => base.field(
                        "value",
                        self.scale(metric.get_untyped().get_value(), is_duration),
                    ),
                    MetricType::HISTOGRAM => self.histogram(base, metric, is_duration),
                    MetricType::SUMMARY => self.summary(base, metric, is_duration),
                };
                if point.has_fields() {
                    points.push(point);
                }
            }
        }
        points
    }

    fn base_point(&self, name: &str, metric: &Metric) -> Point {
        let mut point = Point::new(name);
        for label in metric.get_label() {
            point = point.tag(label.get_name(), label.get_value());
        }
        point.tags(&self.tags)
    }

    fn scale(&self, value: f64, is_duration: bool) -> f64 {
        if is_duration {
            self.duration_unit.from_seconds(value)
        } else {
            value
        }
    }

    fn counter(&self, point: Point, name: &str, metric: &Metric, now: Instant) -> Point {
        let value = metric.get_counter().get_value();
        let key = series_key(name, metric);

        let previous = self.last_counts.lock().insert(key, (value, now));
        let point = point.field("count", value);

        match previous {
            Some((prev_value, prev_at)) if value >= prev_value => {
                let elapsed = now.saturating_duration_since(prev_at).as_secs_f64();
                if elapsed > 0.0 {
                    let per_second = (value - prev_value) / elapsed;
                    point.field("rate", self.rate_unit.rate_from_per_second(per_second))
                } else {
                    point
                }
            }
            _ => point,
        }
    }

    fn histogram(&self, point: Point, metric: &Metric, is_duration: bool) -> Point {
        let histogram = metric.get_histogram();
        let count = histogram.get_sample_count();
        let sum = histogram.get_sample_sum();

        let mut point = point
            .int_field("count", count as i64)
            .field("sum", self.scale(sum, is_duration));
        if count > 0 {
            point = point.field("mean", self.scale(sum / count as f64, is_duration));
        }
        for (field, q) in HISTOGRAM_PERCENTILES {
            if let Some(value) = bucket_quantile(q, histogram.get_bucket(), count) {
                point = point.field(field, self.scale(value, is_duration));
            }
        }
        point
    }

    fn summary(&self, point: Point, metric: &Metric, is_duration: bool) -> Point {
        let summary = metric.get_summary();
        let count = summary.get_sample_count();
        let sum = summary.get_sample_sum();

        let mut point = point
            .int_field("count", count as i64)
            .field("sum", self.scale(sum, is_duration));
        if count > 0 {
            point = point.field("mean", self.scale(sum / count as f64, is_duration));
        }
        for quantile in summary.get_quantile() {
            point = point.field(
                percentile_field(quantile.get_quantile()),
                self.scale(quantile.get_value(), is_duration),
            );
        }
        point
    }
}

fn series_key(name: &str, metric: &Metric) -> String {
    let mut key = name.to_string();
    let mut labels: Vec<_> = metric
        .get_label()
        .iter()
        .map(|l| (l.get_name(), l.get_value()))
        .collect();
    labels.sort_unstable();
    for (k, v) in labels {
        key.push(',');
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

/// `p50`, `p99`, `p99.9` for quantiles 0.5, 0.99, 0.999.
fn percentile_field(quantile: f64) -> String {
    let pct = (quantile * 100.0 * 1000.0).round() / 1000.0;
    format!("p{}", pct)
}

/// Estimates quantile `q` from cumulative buckets by linear interpolation
/// inside the bucket holding the requested rank. Ranks past the last finite
/// bound report that bound.
pub(crate) fn bucket_quantile(q: f64, buckets: &[Bucket], total: u64) -> Option<f64> {
    if total == 0 || buckets.is_empty() {
        return None;
    }
    let rank = q * total as f64;

    let mut lower = 0.0;
    let mut below = 0u64;
    for (i, bucket) in buckets.iter().enumerate() {
        let upper = bucket.get_upper_bound();
        let cumulative = bucket.get_cumulative_count();
        if cumulative as f64 >= rank {
            if i == 0 && upper <= 0.0 {
                return Some(upper);
            }
            let in_bucket = cumulative.saturating_sub(below);
            if in_bucket == 0 || upper.is_infinite() {
                return Some(if upper.is_infinite() { lower } else { upper });
            }
            let fraction = (rank - below as f64) / in_bucket as f64;
            return Some(lower + (upper - lower) * fraction);
        }
        lower = upper;
        below = cumulative;
    }

    buckets
        .iter()
        .rev()
        .map(Bucket::get_upper_bound)
        .find(|bound| bound.is_finite())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prometheus::{
        Counter, CounterVec, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry,
    };
    use reporter_config::PredicateConfig;

    use prometheus::proto::{Quantile, Summary, Untyped};

    use super::*;
    use crate::line_protocol::{self, FieldValue};

    fn converter(filter: MetricFilter) -> SnapshotConverter {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_string(), "web-01".to_string());
        SnapshotConverter::new(
            TimeUnit::Seconds,
            TimeUnit::Milliseconds,
            TimeUnit::Seconds,
            tags,
            filter,
        )
    }

    fn float(point: &Point, field: &str) -> f64 {
        match point.get_field(field) {
            Some(FieldValue::Float(v)) => v,
            other => panic!("field {} was {:?}", field, other),
        }
    }

    fn find<'a>(points: &'a [Point], name: &str) -> &'a Point {
        points
            .iter()
            .find(|p| p.measurement() == name)
            .unwrap_or_else(|| panic!("no point named {}", name))
    }

    #[test]
    fn counter_rate_from_second_snapshot() {
        let registry = Registry::new();
        let requests = IntCounter::new("requests_total", "requests").unwrap();
        registry.register(Box::new(requests.clone())).unwrap();

        let conv = converter(MetricFilter::all());
        let start = Instant::now();

        requests.inc_by(10);
        let first = conv.convert(&registry.gather(), start, 0);
        assert_eq!(float(&first[0], "count"), 10.0);
        assert!(first[0].get_field("rate").is_none());

        requests.inc_by(20);
        let second = conv.convert(&registry.gather(), start + Duration::from_secs(2), 0);
        assert_eq!(float(&second[0], "count"), 30.0);
        assert_eq!(float(&second[0], "rate"), 10.0);
    }

    #[test]
    fn rate_uses_rate_unit() {
        let registry = Registry::new();
        let events = Counter::new("events_total", "events").unwrap();
        registry.register(Box::new(events.clone())).unwrap();

        let mut conv = converter(MetricFilter::all());
        conv.rate_unit = TimeUnit::Minutes;
        let start = Instant::now();
        conv.convert(&registry.gather(), start, 0);
        events.inc_by(5.0);
        let points = conv.convert(&registry.gather(), start + Duration::from_secs(10), 0);
        assert_eq!(float(&points[0], "rate"), 30.0);
    }

    #[test]
    fn labels_become_tags_and_reporter_tags_win() {
        let registry = Registry::new();
        let by_host = CounterVec::new(Opts::new("hits_total", "hits"), &["route", "host"]).unwrap();
        registry.register(Box::new(by_host.clone())).unwrap();
        by_host.with_label_values(&["/a", "label-host"]).inc();

        let points = converter(MetricFilter::all()).convert(&registry.gather(), Instant::now(), 0);
        assert_eq!(points[0].get_tag("route"), Some("/a"));
        assert_eq!(points[0].get_tag("host"), Some("web-01"));
    }

    #[test]
    fn gauges_and_duration_conversion() {
        let registry = Registry::new();
        let queue = Gauge::new("queue_depth", "depth").unwrap();
        let last = Gauge::new("last_flush_seconds", "flush").unwrap();
        registry.register(Box::new(queue.clone())).unwrap();
        registry.register(Box::new(last.clone())).unwrap();
        queue.set(7.0);
        last.set(0.25);

        let points = converter(MetricFilter::all()).convert(&registry.gather(), Instant::now(), 0);
        assert_eq!(float(find(&points, "queue_depth"), "value"), 7.0);
        assert_eq!(float(find(&points, "last_flush_seconds"), "value"), 250.0);
    }

    #[test]
    fn histogram_fields() {
        let registry = Registry::new();
        let latency = Histogram::with_opts(
            HistogramOpts::new("request_latency_seconds", "latency").buckets(vec![0.1, 0.2, 0.4]),
        )
        .unwrap();
        registry.register(Box::new(latency.clone())).unwrap();
        for v in [0.05, 0.05, 0.15, 0.3] {
            latency.observe(v);
        }

        let points = converter(MetricFilter::all()).convert(&registry.gather(), Instant::now(), 0);
        let point = &points[0];
        assert_eq!(point.get_field("count"), Some(FieldValue::Integer(4)));
        assert!((float(point, "sum") - 550.0).abs() < 1e-6);
        assert!((float(point, "mean") - 137.5).abs() < 1e-6);
        // rank 2 of 4 lands at the top of the first bucket
        assert!((float(point, "p50") - 100.0).abs() < 1e-6);
        // rank 3.96 of 4 interpolates inside the (0.2, 0.4] bucket
        assert!((float(point, "p99") - 392.0).abs() < 1e-6);
    }

    #[test]
    fn filter_is_applied_to_family_names() {
        let registry = Registry::new();
        let kept = Gauge::new("http_inflight", "kept").unwrap();
        let dropped = Gauge::new("reporter_internal", "dropped").unwrap();
        registry.register(Box::new(kept.clone())).unwrap();
        registry.register(Box::new(dropped.clone())).unwrap();

        let filter = MetricFilter::from_predicate(Some(&PredicateConfig::deny(["reporter_.*"])))
            .unwrap();
        let points = converter(filter).convert(&registry.gather(), Instant::now(), 0);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement(), "http_inflight");
    }

    #[test]
    fn timestamps_use_precision() {
        let registry = Registry::new();
        let g = Gauge::new("g", "g").unwrap();
        registry.register(Box::new(g.clone())).unwrap();
        let points = converter(MetricFilter::all()).convert(
            &registry.gather(),
            Instant::now(),
            1_500_000_000_000,
        );
        let mut line = String::new();
        points[0].write_to(&mut line);
        assert!(line.ends_with(" 1500"));
    }

    fn summary_family(name: &str, count: u64, sum: f64, quantiles: &[(f64, f64)]) -> MetricFamily {
        let mut summary = Summary::new();
        summary.set_sample_count(count);
        summary.set_sample_sum(sum);
        for (q, value) in quantiles {
            let mut quantile = Quantile::new();
            quantile.set_quantile(*q);
            quantile.set_value(*value);
            summary.mut_quantile().push(quantile);
        }

        let mut metric = Metric::new();
        metric.set_summary(summary);
        let mut family = MetricFamily::new();
        family.set_name(name.to_string());
        family.set_field_type(MetricType::SUMMARY);
        family.mut_metric().push(metric);
        family
    }

    #[test]
    fn summary_fields_are_scaled_for_durations() {
        let families = [
            summary_family("rpc_seconds", 4, 1.0, &[(0.5, 0.2), (0.999, 0.5)]),
            summary_family("payload_bytes", 2, 300.0, &[(0.5, 100.0)]),
            summary_family("idle_seconds", 0, 0.0, &[]),
        ];

        let points = converter(MetricFilter::all()).convert(&families, Instant::now(), 0);
        assert_eq!(
            line_protocol::encode(&points),
            "rpc_seconds,host=web-01 count=4i,sum=1000,mean=250,p50=200,p99.9=500 0\n\
             payload_bytes,host=web-01 count=2i,sum=300,mean=150,p50=100 0\n\
             idle_seconds,host=web-01 count=0i,sum=0 0\n"
        );
    }

    #[test]
    fn untyped_values_are_reported() {
        let mut untyped = Untyped::new();
        untyped.set_value(2.5);
        let mut metric = Metric::new();
        metric.set_untyped(untyped);
        let mut family = MetricFamily::new();
        family.set_name("legacy_load".to_string());
        family.set_field_type(MetricType::UNTYPED);
        family.mut_metric().push(metric);

        let points = converter(MetricFilter::all()).convert(&[family], Instant::now(), 0);
        assert_eq!(
            line_protocol::encode(&points),
            "legacy_load,host=web-01 value=2.5 0\n"
        );
    }

    #[test]
    fn quantile_edge_cases() {
        assert_eq!(bucket_quantile(0.5, &[], 10), None);

        let mut b = Bucket::new();
        b.set_upper_bound(1.0);
        b.set_cumulative_count(0);
        // every sample above the last bound
        assert_eq!(bucket_quantile(0.5, &[b], 4), Some(1.0));
    }

    #[test]
    fn percentile_names() {
        assert_eq!(percentile_field(0.5), "p50");
        assert_eq!(percentile_field(0.99), "p99");
        assert_eq!(percentile_field(0.999), "p99.9");
    }
}
