//! Retention time tolerances and m/z window helpers
use std::fmt::Display;
use std::num::ParseFloatError;
use std::str::FromStr;

use mzpeaks::Tolerance;
use thiserror::Error;

/// A symmetric retention time window, either a fixed width in minutes or
/// a fraction of the reference time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RtTolerance {
    Absolute(f64),
    Relative(f64),
}

impl Default for RtTolerance {
    fn default() -> Self {
        Self::Absolute(0.1)
    }
}

impl RtTolerance {
    /// The half width of the window centred on `rt`
    pub fn half_width(&self, rt: f64) -> f64 {
        match self {
            Self::Absolute(width) => *width,
            Self::Relative(frac) => (rt * frac).abs(),
        }
    }

    pub fn bounds(&self, rt: f64) -> (f64, f64) {
        let width = self.half_width(rt);
        (rt - width, rt + width)
    }

    pub fn test(&self, query: f64, reference: f64) -> bool {
        let (low, high) = self.bounds(reference);
        low <= query && query <= high
    }
}

impl Display for RtTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute(width) => write!(f, "{width}"),
            Self::Relative(frac) => write!(f, "{}%", frac * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToleranceParseError {
    #[error("Failed to parse tolerance value {0}")]
    MalformedValue(#[from] ParseFloatError),
    #[error("Tolerance cannot be negative, got {0}")]
    Negative(f64),
    #[error("Unknown tolerance unit {0:?}")]
    UnknownUnit(String),
}

impl FromStr for RtTolerance {
    type Err = ToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (value, relative) = match s.strip_suffix('%') {
            Some(rest) => (rest.trim().parse::<f64>()?, true),
            None => (s.strip_suffix("min").unwrap_or(s).trim().parse::<f64>()?, false),
        };
        if value < 0.0 {
            return Err(ToleranceParseError::Negative(value));
        }
        if relative {
            Ok(Self::Relative(value / 100.0))
        } else {
            Ok(Self::Absolute(value))
        }
    }
}

/// Parse an m/z tolerance written as `<value>ppm` or `<value>da`
pub fn parse_mz_tolerance(s: &str) -> Result<Tolerance, ToleranceParseError> {
    let lowered = s.trim().to_lowercase();
    let (number, unit) = match lowered.find(|c: char| c.is_ascii_alphabetic()) {
        Some(i) => lowered.split_at(i),
        None => (lowered.as_str(), "ppm"),
    };
    let value: f64 = number.trim().parse()?;
    if value < 0.0 {
        return Err(ToleranceParseError::Negative(value));
    }
    match unit.trim() {
        "ppm" => Ok(Tolerance::PPM(value)),
        "da" | "th" => Ok(Tolerance::Da(value)),
        other => Err(ToleranceParseError::UnknownUnit(other.to_string())),
    }
}

pub fn format_mz_tolerance(tol: &Tolerance) -> String {
    match tol {
        Tolerance::PPM(value) => format!("{value}ppm"),
        Tolerance::Da(value) => format!("{value}da"),
    }
}

/// Widen the m/z range `[low, high]` outward by `tolerance` on each side
pub fn widen_mz_range(tolerance: &Tolerance, low: f64, high: f64) -> (f64, f64) {
    (tolerance.bounds(low).0, tolerance.bounds(high).1)
}
