//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use validator::ValidationError;

use crate::host::HostPort;
use crate::influxdb::InfluxDbReporterConfig;
use crate::predicate::anchor_pattern;

/// Validate that every predicate pattern compiles once anchored to the whole
/// metric name.
pub fn validate_patterns(patterns: &[String]) -> Result<(), ValidationError> {
    for pattern in patterns {
        if regex::Regex::new(&anchor_pattern(pattern)).is_err() {
            let mut err = ValidationError::new("invalid_pattern");
            err.message = Some(format!("invalid metric name pattern '{}'", pattern).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Validate the transport protocol of the write endpoint.
pub fn validate_protocol(protocol: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(http|https)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(protocol) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_protocol"))
    }
}

/// Validate the host list sources of an InfluxDB reporter.
///
/// `hosts_string` must parse, and a single `host` needs a `port`.
pub fn validate_host_sources(config: &InfluxDbReporterConfig) -> Result<(), ValidationError> {
    if let Some(list) = &config.hosts_string {
        if let Err(e) = HostPort::parse_list(list) {
            let mut err = ValidationError::new("invalid_hosts_string");
            err.message = Some(e.to_string().into());
            return Err(err);
        }
    }
    if config.host.is_some() && config.port.is_none() {
        return Err(ValidationError::new("host_without_port"));
    }
    Ok(())
}
