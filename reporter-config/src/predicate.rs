//! Metric name predicate configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Whether the predicate patterns list metrics to keep or to drop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Only metrics matching a pattern are reported.
    White,
    /// Metrics matching a pattern are dropped.
    #[default]
    Black,
}

/// Metric-name filter predicate.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PredicateConfig {
    #[serde(default)]
    pub color: Color,

    /// Regular expressions matched against the whole metric name.
    #[validate(custom(function = validation::validate_patterns))]
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Wraps `pattern` so that it has to match a whole metric name.
pub fn anchor_pattern(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

impl PredicateConfig {
    /// Patterns in the form they are compiled and validated in.
    pub fn anchored_patterns(&self) -> impl Iterator<Item = String> + '_ {
        self.patterns.iter().map(|pattern| anchor_pattern(pattern))
    }

    pub fn allow(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            color: Color::White,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn deny(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            color: Color::Black,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}
