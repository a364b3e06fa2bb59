use std::fmt::Display;
use std::num::ParseFloatError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An inclusive retention time window in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
        }
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeParseError {
    #[error("Failed to parse time range start {0}")]
    MalformedStart(#[source] ParseFloatError),
    #[error("Failed to parse time range end {0}")]
    MalformedEnd(#[source] ParseFloatError),
}

impl FromStr for TimeRange {
    type Err = TimeRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = [' ', ':', '-']
            .into_iter()
            .find(|c| s.contains(*c))
            .unwrap_or(' ');
        let (start_s, end_s) = s.split_once(sep).unwrap_or((s, ""));
        let start = match start_s.trim() {
            "" => 0.0,
            v => v.parse().map_err(TimeRangeParseError::MalformedStart)?,
        };
        let end = match end_s.trim() {
            "" => f64::INFINITY,
            v => v.parse().map_err(TimeRangeParseError::MalformedEnd)?,
        };
        Ok(Self { start, end })
    }
}

impl TryFrom<String> for TimeRange {
    type Error = TimeRangeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(value: TimeRange) -> Self {
        value.to_string()
    }
}

impl From<TimeRange> for (f64, f64) {
    fn from(value: TimeRange) -> Self {
        (value.start, value.end)
    }
}
