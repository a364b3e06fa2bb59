//! Per-sample LC-MS features and the derived quantities computed from their traces
use itertools::{Itertools, MinMaxResult};
use mzpeaks::{prelude::*, Time, MZ};

use crate::scan::SampleId;

/// One (scan, m/z, intensity) observation of a feature trace
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeaturePoint {
    /// The source index of the scan the point was read from
    pub scan_index: usize,
    /// Retention time in minutes
    pub time: f64,
    pub mz: f64,
    pub intensity: f32,
}

impl FeaturePoint {
    pub fn new(scan_index: usize, time: f64, mz: f64, intensity: f32) -> Self {
        Self {
            scan_index,
            time,
            mz,
            intensity,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.intensity <= 0.0
    }
}

/// Orders by m/z then time only, so two points may compare `Equal` without
/// being `==`
impl PartialOrd for FeaturePoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.mz.partial_cmp(&other.mz) {
            Some(std::cmp::Ordering::Equal) => self.time.partial_cmp(&other.time),
            ord => ord,
        }
    }
}

impl CoordinateLike<MZ> for FeaturePoint {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for FeaturePoint {
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureStatus {
    /// Found by chromatogram building
    #[default]
    Detected,
    /// Reconstructed from raw scans by gap filling
    Estimated,
}

/// A chromatographic feature of one sample.
///
/// The summary fields are computed once from `points` by [`Feature::from_points`]
/// and are not kept in sync with later edits of the trace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feature {
    pub sample: SampleId,
    pub status: FeatureStatus,
    /// The median m/z of the non-zero points
    pub mz: f64,
    /// The apex retention time in minutes
    pub rt: f64,
    pub height: f32,
    /// The area under the trace, integrated over seconds
    pub area: f32,
    pub mz_range: (f64, f64),
    pub rt_range: (f64, f64),
    pub intensity_range: (f32, f32),
    pub points: Vec<FeaturePoint>,
    /// Source indices of fragmentation scans, most intense first
    pub fragment_scans: Vec<usize>,
}

impl Feature {
    pub fn from_points(
        sample: SampleId,
        status: FeatureStatus,
        points: Vec<FeaturePoint>,
    ) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut mzs: Vec<f64> = points
            .iter()
            .filter(|p| !p.is_zero())
            .map(|p| p.mz)
            .collect();
        if mzs.is_empty() {
            mzs.extend(points.iter().map(|p| p.mz));
        }
        mzs.sort_by(|a, b| a.total_cmp(b));
        let mz = quantile(&mzs, 0.5)?;
        let mz_range = (mzs[0], mzs[mzs.len() - 1]);

        let apex = points
            .iter()
            .fold(&points[0], |best, p| if p.intensity > best.intensity { p } else { best });

        let rt_range = match points.iter().map(|p| p.time).minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(t) => (t, t),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let intensity_range = match points
            .iter()
            .map(|p| p.intensity)
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(i) => (i, i),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };

        Some(Self {
            sample,
            status,
            mz,
            rt: apex.time,
            height: apex.intensity,
            area: trapezoid_area(&points),
            mz_range,
            rt_range,
            intensity_range,
            points,
            fragment_scans: Vec::new(),
        })
    }

    pub fn with_fragment_scans(mut self, fragment_scans: Vec<usize>) -> Self {
        self.fragment_scans = fragment_scans;
        self
    }

    /// The representative fragmentation scan, if any were found
    pub fn best_fragment_scan(&self) -> Option<usize> {
        self.fragment_scans.first().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_detected(&self) -> bool {
        matches!(self.status, FeatureStatus::Detected)
    }
}

/// Orders by m/z then retention time only. Features that compare `Equal`
/// here are not necessarily `==`.
impl PartialOrd for Feature {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.mz.partial_cmp(&other.mz) {
            Some(std::cmp::Ordering::Equal) => self.rt.partial_cmp(&other.rt),
            ord => ord,
        }
    }
}

impl CoordinateLike<MZ> for Feature {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Time> for Feature {
    fn coordinate(&self) -> f64 {
        self.rt
    }
}

impl IntensityMeasurement for Feature {
    fn intensity(&self) -> f32 {
        self.height
    }
}

/// The `q` quantile of sorted `values`, averaging the values at the floor and
/// ceiling positions of `(n - 1) * q`
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let pos = (values.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = values[pos.floor() as usize];
    let hi = values[pos.ceil() as usize];
    Some((lo + hi) / 2.0)
}

/// Trapezoidal integration of intensity over retention time, with time
/// converted from minutes to seconds
pub fn trapezoid_area(points: &[FeaturePoint]) -> f32 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| {
            (b.time - a.time) * 60.0 * (a.intensity as f64 + b.intensity as f64) / 2.0
        })
        .sum::<f64>() as f32
}

/// Drop zero intensity points from both ends of a trace
pub fn trim_zero_edges(points: &mut Vec<FeaturePoint>) {
    let Some(last) = points.iter().rposition(|p| !p.is_zero()) else {
        points.clear();
        return;
    };
    points.truncate(last + 1);
    let first = points.iter().position(|p| !p.is_zero()).unwrap_or(0);
    points.drain(..first);
}
