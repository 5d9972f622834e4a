//! # Reporter Configuration System
//!
//! Configuration management for the metrics reporters.
//!
//! ## Features
//! - **Layered Loading**: defaults, YAML files and `REPORTER_*` environment variables
//! - **Validation**: every reporter is checked before it is handed out
//! - **Host Lists**: `hosts`, `hosts_string` or a single `host`/`port`, resolved in that order

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

mod error;
mod host;
mod influxdb;
mod predicate;
mod tag;
mod units;
mod validation;

pub use error::{ConfigError, HostPortError, TimeUnitError};
pub use host::HostPort;
pub use influxdb::InfluxDbReporterConfig;
pub use predicate::{anchor_pattern, Color, PredicateConfig};
pub use tag::{needs_lookup, resolve_tag, HostIdentity};
pub use units::TimeUnit;

/// Top‑level configuration container for all reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Default)]
pub struct ReporterConfig {
    /// InfluxDB reporters, each enabled independently.
    #[validate(nested)]
    #[serde(default)]
    pub influxdb: Vec<InfluxDbReporterConfig>,
}

impl ReporterConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/reporter.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Environment‑specific overrides.
    /// 4. `REPORTER_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(ReporterConfig::default()));

        if Path::new("config/reporter.yaml").exists() {
            figment = figment.merge(Yaml::file("config/reporter.yaml"));
        } else {
            info!("config/reporter.yaml not found, using default configuration");
        }

        let env = std::env::var("REPORTER_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("REPORTER_").split("__")))
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::new()
                .merge(Yaml::file(path))
                .merge(Env::prefixed("REPORTER_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
