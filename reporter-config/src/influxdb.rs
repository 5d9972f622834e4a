//! InfluxDB reporter configuration.
//!
//! Connection parameters for pushing metrics to the InfluxDB v1 write API:
//! - Candidate hosts, tried in order
//! - Database, credentials and timeouts
//! - Reporting period and rate/duration units
//! - Host tag and metric-name predicate

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::{self, Validate};

use crate::host::HostPort;
use crate::predicate::PredicateConfig;
use crate::tag::{needs_lookup, resolve_tag, HostIdentity};
use crate::units::TimeUnit;
use crate::validation;

/// Configuration of one InfluxDB reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validation::validate_host_sources))]
pub struct InfluxDbReporterConfig {
    /// Reporting period, expressed in `timeunit`.
    #[validate(range(min = 1))]
    #[serde(default = "default_period")]
    pub period: u64,

    #[serde(default = "default_timeunit")]
    pub timeunit: TimeUnit,

    /// Unit rates are converted to; also the write precision.
    #[serde(default = "default_rateunit")]
    pub rateunit: TimeUnit,

    /// Unit `_seconds` metrics are converted to.
    #[serde(default = "default_durationunit")]
    pub durationunit: TimeUnit,

    /// Metric-name filter. Absent means every metric is reported.
    #[validate(nested)]
    #[serde(default)]
    pub predicate: Option<PredicateConfig>,

    /// Candidate hosts in failover order.
    #[validate(nested)]
    #[serde(default)]
    pub hosts: Option<Vec<HostPort>>,

    /// Candidate hosts as `host1:port1,host2:port2`.
    #[serde(default, alias = "hostsString")]
    pub hosts_string: Option<String>,

    /// Single host, used with `port` when no list is given.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[validate(custom(function = validation::validate_protocol))]
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[validate(length(min = 1))]
    #[serde(default, alias = "dbName")]
    pub db_name: String,

    /// Credentials as `user:password`. Empty disables authentication.
    #[serde(default)]
    pub auth: Option<String>,

    /// Connection timeout (milliseconds).
    #[validate(range(min = 1, max = 600000))]
    #[serde(default = "default_timeout", alias = "connectionTimeout")]
    pub connection_timeout: u64,

    /// Read timeout (milliseconds).
    #[validate(range(min = 1, max = 600000))]
    #[serde(default = "default_timeout", alias = "readTimeout")]
    pub read_timeout: u64,

    /// Value of the `host` tag, with `${host.*}` placeholders.
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Probe `/ping` while connecting and fail over when it does not answer.
    #[serde(default, alias = "pingOnConnect")]
    pub ping_on_connect: bool,
}

fn default_period() -> u64 {
    60
}

fn default_timeunit() -> TimeUnit {
    TimeUnit::Seconds
}

fn default_rateunit() -> TimeUnit {
    TimeUnit::Seconds
}

fn default_durationunit() -> TimeUnit {
    TimeUnit::Milliseconds
}

fn default_protocol() -> String {
    "http".into()
}

fn default_timeout() -> u64 {
    1000
}

fn default_tag() -> String {
    "${host.name}".into()
}

impl Default for InfluxDbReporterConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            timeunit: default_timeunit(),
            rateunit: default_rateunit(),
            durationunit: default_durationunit(),
            predicate: None,
            hosts: None,
            hosts_string: None,
            host: None,
            port: None,
            protocol: default_protocol(),
            db_name: String::new(),
            auth: None,
            connection_timeout: default_timeout(),
            read_timeout: default_timeout(),
            tag: default_tag(),
            ping_on_connect: false,
        }
    }
}

impl InfluxDbReporterConfig {
    /// Candidate hosts in the order they should be tried.
    ///
    /// `hosts` wins when non-empty, then `hosts_string`, then `host`/`port`.
    pub fn full_host_list(&self) -> Vec<HostPort> {
        if let Some(hosts) = self.hosts.as_ref().filter(|hosts| !hosts.is_empty()) {
            return hosts.clone();
        }

        if let Some(list) = &self.hosts_string {
            return list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .filter_map(|entry| match entry.parse::<HostPort>() {
                    Ok(host) => Some(host),
                    Err(e) => {
                        warn!(entry, error = %e, "Skipping unparseable host entry");
                        None
                    }
                })
                .collect();
        }

        match (&self.host, self.port) {
            (Some(host), Some(port)) if !host.is_empty() => vec![HostPort::new(host.clone(), port)],
            _ => Vec::new(),
        }
    }

    /// Tag value with placeholders resolved against the local host.
    ///
    /// Blocks on a resolver lookup when [`tag_needs_lookup`](Self::tag_needs_lookup).
    pub fn resolved_tag(&self) -> String {
        if !self.tag.contains("${host.") {
            return self.tag.clone();
        }
        resolve_tag(&self.tag, &HostIdentity::local_for(&self.tag))
    }

    pub fn tag_needs_lookup(&self) -> bool {
        needs_lookup(&self.tag)
    }

    /// Credentials split into user and password, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let auth = self.auth.as_deref().filter(|auth| !auth.is_empty())?;
        Some(auth.split_once(':').unwrap_or((auth, "")))
    }

    /// Reporting period as a duration.
    pub fn period_duration(&self) -> Duration {
        self.timeunit.duration(self.period)
    }

    pub fn connection_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connection_timeout)
    }

    pub fn read_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.read_timeout)
    }
}
