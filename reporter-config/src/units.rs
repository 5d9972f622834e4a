//! Time units used for reporting periods, rate/duration conversion and
//! write precision.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TimeUnitError;

/// Granularity of time, named after the unit names accepted in configuration
/// files (`SECONDS`, `milliseconds`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Number of nanoseconds in one unit.
    pub const fn nanos(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Length of one unit in seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.nanos() as f64 / 1e9
    }

    /// `amount` units as a [`Duration`], saturating at [`Duration::MAX`].
    pub fn duration(self, amount: u64) -> Duration {
        let total = (amount as u128).saturating_mul(self.nanos());
        let secs = total / 1_000_000_000;
        if secs > u64::MAX as u128 {
            return Duration::MAX;
        }
        Duration::new(secs as u64, (total % 1_000_000_000) as u32)
    }

    /// Converts a per-second rate into a rate per this unit.
    pub fn rate_from_per_second(self, per_second: f64) -> f64 {
        per_second * self.nanos() as f64 / 1e9
    }

    /// Converts a value measured in seconds into this unit.
    pub fn from_seconds(self, seconds: f64) -> f64 {
        seconds * 1e9 / self.nanos() as f64
    }

    /// Unit that timestamps are written in when this unit is the precision.
    ///
    /// The write API has no day precision, so days fall back to hours.
    pub const fn precision_unit(self) -> TimeUnit {
        match self {
            TimeUnit::Days => TimeUnit::Hours,
            other => other,
        }
    }

    /// Value of the `precision` query parameter of the write endpoint.
    pub const fn precision(self) -> &'static str {
        match self.precision_unit() {
            TimeUnit::Nanoseconds => "n",
            TimeUnit::Microseconds => "u",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours | TimeUnit::Days => "h",
        }
    }

    /// Truncates a nanosecond unix timestamp to this unit's precision.
    pub fn timestamp(self, unix_nanos: i64) -> i64 {
        (unix_nanos as i128 / self.precision_unit().nanos() as i128) as i64
    }

    pub const fn name(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "NANOSECONDS",
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = TimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NANOSECONDS" => Ok(TimeUnit::Nanoseconds),
            "MICROSECONDS" => Ok(TimeUnit::Microseconds),
            "MILLISECONDS" => Ok(TimeUnit::Milliseconds),
            "SECONDS" => Ok(TimeUnit::Seconds),
            "MINUTES" => Ok(TimeUnit::Minutes),
            "HOURS" => Ok(TimeUnit::Hours),
            "DAYS" => Ok(TimeUnit::Days),
            _ => Err(TimeUnitError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = TimeUnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeUnit> for String {
    fn from(unit: TimeUnit) -> Self {
        unit.name().to_string()
    }
}
