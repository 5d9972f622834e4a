//! Metric-name filter derived from a [`PredicateConfig`].

use regex::RegexSet;
use reporter_config::{Color, PredicateConfig};

/// Decides which metric families are reported.
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    rule: Option<(Color, RegexSet)>,
}

impl MetricFilter {
    /// A filter that keeps every metric.
    pub fn all() -> Self {
        Self::default()
    }

    /// Compiles `predicate`. Each pattern must match the whole name.
    pub fn from_predicate(predicate: Option<&PredicateConfig>) -> Result<Self, regex::Error> {
        let Some(predicate) = predicate else {
            return Ok(Self::all());
        };

        let set = RegexSet::new(predicate.anchored_patterns())?;
        Ok(Self {
            rule: Some((predicate.color, set)),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.rule {
            None => true,
            Some((Color::White, set)) => set.is_match(name),
            Some((Color::Black, set)) => !set.is_match(name),
        }
    }
}
