use crate::errors::InvalidInterval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Sensor Models
// ============================================================================

/// One row of the PRTG sensor table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub probe: String,
    pub group: String,
    pub device: String,
    /// Interval as PRTG renders it, e.g. "1 h"
    pub interval: String,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Probe: {}] [Group: {}] [Device: {}] [Sensor Name: {}] [Sensor ID: {}]",
            self.probe, self.group, self.device, self.name, self.id
        )
    }
}

/// A polling interval in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval(u32);

impl Interval {
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn as_seconds(&self) -> u32 {
        self.0
    }
}

impl FromStr for Interval {
    type Err = InvalidInterval;

    /// Parses PRTG's readable form: "30 s", "5 m", "1 h", "1 d" (space optional)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidInterval(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let value: u32 = digits.parse().map_err(|_| invalid())?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
            "m" | "min" | "mins" | "minute" | "minutes" => 60,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
            "d" | "day" | "days" => 86_400,
            _ => return Err(invalid()),
        };

        value.checked_mul(multiplier).map(Self).ok_or_else(invalid)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0;
        if seconds != 0 && seconds % 86_400 == 0 {
            write!(f, "{} d", seconds / 86_400)
        } else if seconds != 0 && seconds % 3600 == 0 {
            write!(f, "{} h", seconds / 3600)
        } else if seconds != 0 && seconds % 60 == 0 {
            write!(f, "{} m", seconds / 60)
        } else {
            write!(f, "{} s", seconds)
        }
    }
}

// ============================================================================
// Run Models
// ============================================================================

/// Why an edit run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    RetrievalFailed,
    ConnectionTimedOut,
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            StopReason::Completed => "Sensors edited from PRTG.",
            StopReason::RetrievalFailed => "Sensor retrieval failed.",
            StopReason::ConnectionTimedOut => "Connection timed out.",
            StopReason::Interrupted => "Run interrupted.",
        };
        f.write_str(message)
    }
}

/// Outcome counts for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub matched: usize,
    pub edits: usize,
    pub errors: usize,
    /// Matches not edited because the run was a dry run
    pub skipped: usize,
    pub reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            matched: 0,
            edits: 0,
            errors: 0,
            skipped: 0,
            reason: StopReason::Completed,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(mut self, reason: StopReason) -> Self {
        self.reason = reason;
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prtg_intervals() {
        assert_eq!("30 s".parse::<Interval>().unwrap().as_seconds(), 30);
        assert_eq!("5 m".parse::<Interval>().unwrap().as_seconds(), 300);
        assert_eq!("1 h".parse::<Interval>().unwrap().as_seconds(), 3600);
        assert_eq!("24 h".parse::<Interval>().unwrap().as_seconds(), 86_400);
        assert_eq!("1 d".parse::<Interval>().unwrap().as_seconds(), 86_400);
        assert_eq!("30m".parse::<Interval>().unwrap().as_seconds(), 1800);
        assert_eq!(" 1 H ".parse::<Interval>().unwrap().as_seconds(), 3600);
        assert_eq!("3600".parse::<Interval>().unwrap().as_seconds(), 3600);
    }

    #[test]
    fn test_reject_malformed_intervals() {
        assert!("".parse::<Interval>().is_err());
        assert!("h".parse::<Interval>().is_err());
        assert!("1 fortnight".parse::<Interval>().is_err());
        assert!("-5 m".parse::<Interval>().is_err());
        assert!("99999999 d".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_display_uses_largest_unit() {
        assert_eq!(Interval::from_seconds(90).to_string(), "90 s");
        assert_eq!(Interval::from_seconds(60).to_string(), "1 m");
        assert_eq!(Interval::from_seconds(1800).to_string(), "30 m");
        assert_eq!(Interval::from_seconds(3600).to_string(), "1 h");
        assert_eq!(Interval::from_seconds(86_400).to_string(), "1 d");
        assert_eq!(Interval::from_seconds(0).to_string(), "0 s");
    }

    #[test]
    fn test_stop_reason_messages() {
        assert_eq!(StopReason::Completed.to_string(), "Sensors edited from PRTG.");
        assert_eq!(
            StopReason::ConnectionTimedOut.to_string(),
            "Connection timed out."
        );
        assert_eq!(StopReason::Interrupted.to_string(), "Run interrupted.");
    }

    #[test]
    fn test_sensor_display_lists_location() {
        let sensor = Sensor {
            id: "2045".to_string(),
            name: "Ping".to_string(),
            probe: "Local Probe".to_string(),
            group: "Servers".to_string(),
            device: "web01".to_string(),
            interval: "1 h".to_string(),
        };
        assert_eq!(
            sensor.to_string(),
            "[Probe: Local Probe] [Group: Servers] [Device: web01] [Sensor Name: Ping] [Sensor ID: 2045]"
        );
    }

    #[test]
    fn test_summary_finish_sets_reason() {
        let summary = RunSummary::start().finish(StopReason::ConnectionTimedOut);
        assert_eq!(summary.reason, StopReason::ConnectionTimedOut);
        assert!(summary.finished_at.is_some());
    }
}
