use std::fmt::Display;
use std::str::FromStr;

use clap::ValueEnum;
use mzdata::spectrum::ScanPolarity;
use serde::{Deserialize, Serialize};

use mzalign::tolerance::{format_mz_tolerance, parse_mz_tolerance, ToleranceParseError};
use mzalign::{RtTolerance, Tolerance};

/// An m/z tolerance written as `10ppm` or `0.005da`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArgTolerance(pub Tolerance);

impl Default for ArgTolerance {
    fn default() -> Self {
        Self(Tolerance::PPM(10.0))
    }
}

impl FromStr for ArgTolerance {
    type Err = ToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mz_tolerance(s).map(Self)
    }
}

impl Display for ArgTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_mz_tolerance(&self.0))
    }
}

impl TryFrom<String> for ArgTolerance {
    type Error = ToleranceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArgTolerance> for String {
    fn from(value: ArgTolerance) -> Self {
        value.to_string()
    }
}

impl From<ArgTolerance> for Tolerance {
    fn from(value: ArgTolerance) -> Self {
        value.0
    }
}

/// A retention time tolerance written as `0.1` (minutes) or `2%`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArgRtTolerance(pub RtTolerance);

impl FromStr for ArgRtTolerance {
    type Err = ToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Display for ArgRtTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ArgRtTolerance {
    type Error = ToleranceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArgRtTolerance> for String {
    fn from(value: ArgRtTolerance) -> Self {
        value.to_string()
    }
}

impl From<ArgRtTolerance> for RtTolerance {
    fn from(value: ArgRtTolerance) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgPolarity {
    #[default]
    /// Use scans of either polarity
    Any,
    Positive,
    Negative,
}

impl Display for ArgPolarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ArgPolarity> for Option<ScanPolarity> {
    fn from(value: ArgPolarity) -> Self {
        match value {
            ArgPolarity::Any => None,
            ArgPolarity::Positive => Some(ScanPolarity::Positive),
            ArgPolarity::Negative => Some(ScanPolarity::Negative),
        }
    }
}
