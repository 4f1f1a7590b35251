// Sensor selection by name or interval

use crate::config::EditorConfig;
use crate::errors::ValidationError;
use crate::models::{Interval, Sensor};
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct IntervalRule {
    text: String,
    parsed: Option<Interval>,
}

impl IntervalRule {
    fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            parsed: text.parse().ok(),
        }
    }

    fn matches(&self, interval: &str) -> bool {
        match (self.parsed, interval.parse::<Interval>().ok()) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => self.text == interval.trim(),
        }
    }
}

/// Predicate selecting the sensors whose interval gets rewritten
///
/// A sensor matches when its name is listed, its name matches a pattern, or
/// its interval equals one of the listed intervals.
#[derive(Debug, Clone)]
pub struct SensorFilter {
    names: HashSet<String>,
    patterns: Vec<Regex>,
    intervals: Vec<IntervalRule>,
}

impl SensorFilter {
    pub fn new<S: AsRef<str>>(
        names: &[S],
        patterns: &[S],
        intervals: &[S],
    ) -> Result<Self, ValidationError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| ValidationError::InvalidFieldValue {
                    field: "editor.match_name_patterns".to_string(),
                    reason: format!("'{}': {}", p.as_ref(), e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            patterns,
            intervals: intervals.iter().map(|i| IntervalRule::new(i.as_ref())).collect(),
        })
    }

    pub fn from_config(config: &EditorConfig) -> Result<Self, ValidationError> {
        Self::new(
            config.match_names.as_slice(),
            config.match_name_patterns.as_slice(),
            config.match_intervals.as_slice(),
        )
    }

    /// True when no rule is configured; such a filter matches nothing
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.patterns.is_empty() && self.intervals.is_empty()
    }

    pub fn matches(&self, sensor: &Sensor) -> bool {
        self.names.contains(&sensor.name)
            || self.patterns.iter().any(|p| p.is_match(&sensor.name))
            || self.intervals.iter().any(|r| r.matches(&sensor.interval))
    }

    /// Matching sensors in table order
    pub fn select<'a>(&self, sensors: &'a [Sensor]) -> Vec<&'a Sensor> {
        sensors.iter().filter(|s| self.matches(s)).collect()
    }
}
