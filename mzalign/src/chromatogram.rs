//! Extracted ion chromatogram construction from the centroided scans of one sample.
//!
//! Every data point of every selected scan is visited in order of descending
//! intensity. A point either joins the chromatogram whose m/z interval owns it,
//! opens a new chromatogram if it is intense enough, or is discarded. Intervals
//! never overlap, so each surviving point belongs to exactly one chromatogram.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Instant;

use identity_hash::BuildIdentityHasher;
use itertools::Itertools;
use mzdata::spectrum::ScanPolarity;
use mzpeaks::Tolerance;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::feature::{quantile, Feature, FeaturePoint, FeatureStatus};
use crate::interval::MzIntervalMap;
use crate::scan::{RawSample, SampleId, Scan, ScanSelection};
use crate::table::FeatureTable;
use crate::task::{CancellationToken, TaskOutcome};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChromatogramError {
    #[error("Scan {scan_id} (index {index}) of {sample} does not have a centroided mass list")]
    MissingMassList {
        sample: String,
        scan_id: String,
        index: usize,
    },
    #[error(
        "Scan {scan_id} of {sample} starts at {time:0.4} which precedes the previous scan at {previous:0.4}"
    )]
    NonMonotonicRetentionTime {
        sample: String,
        scan_id: String,
        time: f64,
        previous: f64,
    },
    #[error("No scans of {sample} matched the scan selection")]
    NoMatchingScans { sample: String },
    #[error("The m/z interval [{low}, {high}] opened for {mz} in {sample} is inverted, chromatogram intervals overlap")]
    OverlappingInterval {
        sample: String,
        mz: f64,
        low: f64,
        high: f64,
    },
}

/// A non-fatal problem with the scans selected for chromatogram building
#[derive(Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    MixedMsLevels { sample: String, levels: Vec<u8> },
    MixedPolarities {
        sample: String,
        polarities: Vec<ScanPolarity>,
    },
}

impl Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MixedMsLevels { sample, levels } => {
                write!(f, "{sample} mixes scans of MS levels {levels:?}")
            }
            Self::MixedPolarities { sample, polarities } => {
                write!(f, "{sample} mixes scans of polarities {polarities:?}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromatogramParams {
    pub mz_tolerance: Tolerance,
    /// The least intense point that may open a new chromatogram
    pub minimum_start_intensity: f32,
    /// A point must be strictly more intense than this to extend a consecutive run
    pub minimum_consecutive_intensity: f32,
    pub minimum_consecutive_scans: usize,
    pub minimum_total_points: usize,
    /// Pad surviving chromatograms with a zero point on each side. Disable
    /// when building images instead of chromatograms.
    pub add_edge_zeros: bool,
}

impl Default for ChromatogramParams {
    fn default() -> Self {
        Self {
            mz_tolerance: Tolerance::PPM(10.0),
            minimum_start_intensity: 1000.0,
            minimum_consecutive_intensity: 500.0,
            minimum_consecutive_scans: 5,
            minimum_total_points: 5,
            add_edge_zeros: true,
        }
    }
}

impl ChromatogramParams {
    pub fn new(
        mz_tolerance: Tolerance,
        minimum_start_intensity: f32,
        minimum_consecutive_intensity: f32,
        minimum_consecutive_scans: usize,
        minimum_total_points: usize,
        add_edge_zeros: bool,
    ) -> Self {
        Self {
            mz_tolerance,
            minimum_start_intensity,
            minimum_consecutive_intensity,
            minimum_consecutive_scans,
            minimum_total_points,
            add_edge_zeros,
        }
    }
}

/// A data point flattened out of its scan. `scan` is the position of the scan
/// in the selected scan list.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ExpandedDataPoint {
    mz: f64,
    intensity: f32,
    scan: usize,
}

/// A chromatogram still being assembled, holding at most one point per scan
#[derive(Debug, Default)]
struct ChromatogramTrace {
    points: HashMap<usize, ExpandedDataPoint, BuildIdentityHasher<usize>>,
}

impl ChromatogramTrace {
    fn new(point: ExpandedDataPoint) -> Self {
        let mut trace = Self::default();
        trace.add(point);
        trace
    }

    /// Add `point` if its scan has no point yet, otherwise drop it
    fn add(&mut self, point: ExpandedDataPoint) -> bool {
        match self.points.entry(point.scan) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(point);
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn into_sorted_points(self) -> Vec<ExpandedDataPoint> {
        let mut points: Vec<_> = self.points.into_values().collect();
        points.sort_unstable_by_key(|p| p.scan);
        points
    }
}

/// The output of building one sample's chromatograms
#[derive(Debug, Clone)]
pub struct ChromatogramSet {
    pub table: FeatureTable,
    pub warnings: Vec<DataQualityWarning>,
    /// The number of data points visited
    pub n_points: usize,
    /// The number of chromatograms opened before finalization
    pub n_opened: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ChromatogramBuilder {
    pub params: ChromatogramParams,
    pub selection: ScanSelection,
}

impl ChromatogramBuilder {
    pub fn new(params: ChromatogramParams, selection: ScanSelection) -> Self {
        Self { params, selection }
    }

    #[instrument(level = "debug", skip_all, fields(sample = %sample.info.name))]
    pub fn build(
        &self,
        sample: &RawSample,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome<ChromatogramSet>, ChromatogramError> {
        let started = Instant::now();
        let scans = sample.select(&self.selection);
        if scans.is_empty() {
            return Err(ChromatogramError::NoMatchingScans {
                sample: sample.name().to_string(),
            });
        }
        let warnings = check_scan_sequence(sample.name(), &scans)?;

        let Some(mut points) = flatten_scans(sample.name(), &scans, cancel)? else {
            return Ok(TaskOutcome::Cancelled);
        };
        let n_points = points.len();
        debug!("Sorting {n_points} data points from {} scans", scans.len());
        points.par_sort_unstable_by(|a, b| {
            b.intensity
                .total_cmp(&a.intensity)
                .then(a.scan.cmp(&b.scan))
                .then(a.mz.total_cmp(&b.mz))
        });

        let Some(traces) = self.assign_points(sample.name(), &points, cancel)? else {
            return Ok(TaskOutcome::Cancelled);
        };
        let n_opened = traces.len();
        if cancel.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }

        let sample_id = sample.id();
        let features: Vec<Feature> = traces
            .into_par_iter()
            .filter_map(|trace| self.finalize(sample_id, &scans, trace))
            .collect();

        let mut table = FeatureTable::new(sample.name(), vec![sample.info.clone()]);
        for feature in features {
            let mut row = table.new_row();
            row.add_feature(0, feature);
            table.push(row);
        }
        table.sort_by_mz();
        table.renumber();

        info!(
            "{}: {} chromatograms kept of {n_opened} opened from {n_points} points in {:0.3?}",
            sample.name(),
            table.len(),
            started.elapsed()
        );
        Ok(TaskOutcome::Completed(ChromatogramSet {
            table,
            warnings,
            n_points,
            n_opened,
        }))
    }

    /// Greedily assign intensity-sorted points to chromatograms
    fn assign_points(
        &self,
        sample: &str,
        points: &[ExpandedDataPoint],
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<ChromatogramTrace>>, ChromatogramError> {
        let mut intervals: MzIntervalMap<usize> = MzIntervalMap::new();
        let mut traces: Vec<ChromatogramTrace> = Vec::new();

        for point in points.iter().copied() {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(owner) = intervals.get(point.mz) {
                traces[owner.value].add(point);
                continue;
            }
            if point.intensity < self.params.minimum_start_intensity {
                continue;
            }

            // `get` missed, so any predecessor ends below `mz` and any successor
            // starts above it. Clipping leaves `low <= mz <= high`, and a point
            // on a shared endpoint was already claimed by the upper interval.
            let (mut low, mut high) = self.params.mz_tolerance.bounds(point.mz);
            if let Some(below) = intervals.predecessor(point.mz) {
                low = low.max(below.high);
            }
            if let Some(above) = intervals.successor(point.mz) {
                high = high.min(above.low);
            }
            if low > high {
                return Err(ChromatogramError::OverlappingInterval {
                    sample: sample.to_string(),
                    mz: point.mz,
                    low,
                    high,
                });
            }
            intervals.insert(low, high, traces.len());
            traces.push(ChromatogramTrace::new(point));
        }
        debug!("Opened {} chromatogram intervals", intervals.len());
        Ok(Some(traces))
    }

    fn longest_consecutive_run(&self, points: &[ExpandedDataPoint]) -> usize {
        let floor = self.params.minimum_consecutive_intensity;
        let mut run = 0;
        let mut longest = 0;
        let mut last_scan: Option<usize> = None;
        for point in points {
            if point.intensity > floor {
                run = match last_scan {
                    Some(scan) if scan + 1 == point.scan => run + 1,
                    _ => 1,
                };
                last_scan = Some(point.scan);
                longest = longest.max(run);
            } else {
                run = 0;
                last_scan = None;
            }
        }
        longest
    }

    fn finalize(
        &self,
        sample: SampleId,
        scans: &[&Scan],
        trace: ChromatogramTrace,
    ) -> Option<Feature> {
        if trace.len() < self.params.minimum_total_points {
            return None;
        }
        let points = trace.into_sorted_points();
        if self.longest_consecutive_run(&points) < self.params.minimum_consecutive_scans {
            return None;
        }

        let first = points.iter().position(|p| p.intensity > 0.0)?;
        let last = points.iter().rposition(|p| p.intensity > 0.0)?;
        let points = &points[first..=last];

        let mut trace: Vec<FeaturePoint> = Vec::with_capacity(points.len() + 2);
        if self.params.add_edge_zeros {
            let mut mzs: Vec<f64> = points.iter().map(|p| p.mz).collect();
            mzs.sort_by(|a, b| a.total_cmp(b));
            let mz = quantile(&mzs, 0.5)?;
            let before = points[0].scan.checked_sub(1);
            let after = Some(points[points.len() - 1].scan + 1).filter(|i| *i < scans.len());
            if let Some(i) = before {
                trace.push(FeaturePoint::new(scans[i].index, scans[i].time, mz, 0.0));
            }
            trace.extend(points.iter().map(|p| to_feature_point(scans, p)));
            if let Some(i) = after {
                trace.push(FeaturePoint::new(scans[i].index, scans[i].time, mz, 0.0));
            }
        } else {
            trace.extend(points.iter().map(|p| to_feature_point(scans, p)));
        }
        Feature::from_points(sample, FeatureStatus::Detected, trace)
    }
}

fn to_feature_point(scans: &[&Scan], point: &ExpandedDataPoint) -> FeaturePoint {
    let scan = scans[point.scan];
    FeaturePoint::new(scan.index, scan.time, point.mz, point.intensity)
}

/// Reject out of order retention times and report mixed acquisition settings
fn check_scan_sequence(
    sample: &str,
    scans: &[&Scan],
) -> Result<Vec<DataQualityWarning>, ChromatogramError> {
    for (prev, scan) in scans.iter().tuple_windows() {
        if scan.time < prev.time {
            return Err(ChromatogramError::NonMonotonicRetentionTime {
                sample: sample.to_string(),
                scan_id: scan.id.clone(),
                time: scan.time,
                previous: prev.time,
            });
        }
    }

    let mut warnings = Vec::new();
    let levels: Vec<u8> = scans.iter().map(|s| s.ms_level).sorted().dedup().collect();
    if levels.len() > 1 {
        let warning = DataQualityWarning::MixedMsLevels {
            sample: sample.to_string(),
            levels,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let mut polarities: Vec<ScanPolarity> = Vec::new();
    for scan in scans {
        if !polarities.contains(&scan.polarity) {
            polarities.push(scan.polarity);
        }
    }
    if polarities.len() > 1 {
        let warning = DataQualityWarning::MixedPolarities {
            sample: sample.to_string(),
            polarities,
        };
        warn!("{warning}");
        warnings.push(warning);
    }
    Ok(warnings)
}

fn flatten_scans(
    sample: &str,
    scans: &[&Scan],
    cancel: &CancellationToken,
) -> Result<Option<Vec<ExpandedDataPoint>>, ChromatogramError> {
    let mut points = Vec::new();
    let mut n_non_finite = 0usize;
    for (position, scan) in scans.iter().enumerate() {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let peaks = scan
            .peaks
            .as_ref()
            .ok_or_else(|| ChromatogramError::MissingMassList {
                sample: sample.to_string(),
                scan_id: scan.id.clone(),
                index: scan.index,
            })?;
        for peak in peaks.as_slice() {
            if !(peak.mz.is_finite() && peak.intensity.is_finite()) {
                n_non_finite += 1;
                continue;
            }
            points.push(ExpandedDataPoint {
                mz: peak.mz,
                intensity: peak.intensity,
                scan: position,
            });
        }
    }
    if n_non_finite > 0 {
        warn!("Skipped {n_non_finite} data points with a non-finite m/z or intensity in {sample}");
    }
    Ok(Some(points))
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::scan::test_data::*;
    use crate::scan::SampleInfo;

    fn params() -> ChromatogramParams {
        ChromatogramParams::new(Tolerance::Da(0.01), 100.0, 50.0, 5, 5, false)
    }

    fn completed(outcome: TaskOutcome<ChromatogramSet>) -> ChromatogramSet {
        outcome.completed().expect("build was not cancelled")
    }

    /// Gaussian-ish elution profile over `n` scans
    fn profile(i: usize, apex: usize, height: f32) -> f32 {
        let d = i as f32 - apex as f32;
        height * (-d * d / 8.0).exp()
    }

    #[test_log::test]
    fn test_single_trace() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 12, |i| {
            vec![(500.0 + (i % 3) as f64 * 0.001, profile(i, 6, 1e4))]
        });
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.table.len(), 1);
        let row = &result.table.rows()[0];
        assert_eq!(row.id, 1);
        let feature = row.feature(0).unwrap();
        assert!((feature.mz - 500.001).abs() < 1e-9);
        assert_eq!(feature.points.iter().map(|p| p.scan_index).max(), Some(11));
        assert!((feature.rt - 0.3).abs() < 1e-9);
        assert!(result.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_intervals_do_not_overlap() -> Result<(), ChromatogramError> {
        // A dense ladder of ions closer together than the tolerance window
        let sample = make_sample(0, 10, |i| {
            (0..40)
                .map(|k| (300.0 + k as f64 * 0.006, 200.0 + ((k * 7 + i) % 11) as f32 * 10.0))
                .collect()
        });
        let builder = ChromatogramBuilder::new(
            ChromatogramParams::new(Tolerance::Da(0.01), 100.0, 0.0, 1, 1, false),
            ScanSelection::default(),
        );
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        let mut total_points = 0;
        let mut seen: HashSet<(usize, u64)> = HashSet::new();
        let mut spans: Vec<(f64, f64)> = Vec::new();
        for row in result.table.iter() {
            let feature = row.feature(0).unwrap();
            let mut scans: Vec<usize> = feature.points.iter().map(|p| p.scan_index).collect();
            let n = scans.len();
            scans.dedup();
            assert_eq!(scans.len(), n, "a chromatogram holds two points from one scan");
            for p in feature.points.iter() {
                assert!(
                    seen.insert((p.scan_index, p.mz.to_bits())),
                    "point {} in scan {} belongs to two chromatograms",
                    p.mz,
                    p.scan_index
                );
            }
            total_points += n;
            spans.push(feature.mz_range);
        }
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (a, b) in spans.iter().tuple_windows() {
            assert!(a.1 < b.0, "{a:?} overlaps {b:?}");
        }
        assert!(total_points <= result.n_points);
        Ok(())
    }

    #[test]
    fn test_shared_endpoint_goes_to_upper_interval() -> Result<(), ChromatogramError> {
        let tolerance = Tolerance::Da(0.25);
        let boundary = 100.25;
        // Scans 0..6 open [99.75, 100.25] and [100.25, 100.75], scans 6 and 7
        // only carry a weaker point sitting on the shared endpoint
        let sample = make_sample(0, 8, |i| {
            if i < 6 {
                vec![(100.0, 1000.0), (100.5, 900.0)]
            } else {
                vec![(boundary, 500.0)]
            }
        });
        let builder = ChromatogramBuilder::new(
            ChromatogramParams::new(tolerance, 100.0, 50.0, 5, 5, false),
            ScanSelection::default(),
        );
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.table.len(), 2);
        let lower = result.table.rows()[0].feature(0).unwrap();
        let upper = result.table.rows()[1].feature(0).unwrap();
        assert!(lower.mz < upper.mz);
        assert_eq!(lower.len(), 6);
        assert!(lower.points.iter().all(|p| p.mz != boundary));
        assert_eq!(upper.len(), 8);
        let on_boundary: Vec<usize> = upper
            .points
            .iter()
            .filter(|p| p.mz == boundary)
            .map(|p| p.scan_index)
            .collect();
        assert_eq!(on_boundary, vec![6, 7]);
        Ok(())
    }

    #[test]
    fn test_non_finite_points_skipped() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 6, |i| {
            vec![(150.0, 1000.0), (150.5 + i as f64, f32::NAN)]
        });
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.n_points, 6);
        assert_eq!(result.n_opened, 1);
        assert_eq!(result.table.len(), 1);
        Ok(())
    }

    #[test]
    fn test_lower_point_in_filled_scan_dropped() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 6, |i| vec![(400.0, 1000.0 + i as f32), (400.004, 900.0)]);
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.table.len(), 1);
        let feature = result.table.rows()[0].feature(0).unwrap();
        assert_eq!(feature.len(), 6);
        assert!(feature.points.iter().all(|p| p.mz == 400.0));
        Ok(())
    }

    #[test]
    fn test_split_run_rejected() -> Result<(), ChromatogramError> {
        // 8 scans where scan 4 dips below the consecutive floor: 4 + 3
        let sample = make_sample(0, 8, |i| {
            let intensity = if i == 4 { 10.0 } else { 1000.0 };
            vec![(600.0, intensity)]
        });
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert!(result.table.is_empty());
        assert_eq!(result.n_opened, 1);

        let sample = make_sample(0, 8, |i| {
            let intensity = if i == 5 { 10.0 } else { 1000.0 };
            vec![(600.0, intensity)]
        });
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.table.len(), 1);
        Ok(())
    }

    #[test]
    fn test_run_on_the_floor_rejected() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 6, |_| vec![(600.0, 50.0)]);
        let params = ChromatogramParams::new(Tolerance::Da(0.01), 10.0, 50.0, 5, 5, false);
        let builder = ChromatogramBuilder::new(params, ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.n_opened, 1);
        assert!(result.table.is_empty());

        let sample = make_sample(0, 6, |_| vec![(600.0, 50.5)]);
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.table.len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_scan_resets_run() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 9, |i| {
            if i == 4 {
                vec![(800.0, 1000.0)]
            } else {
                vec![(700.5, 1000.0), (700.0, 1000.0)]
            }
        });
        let mut p = params();
        p.minimum_consecutive_scans = 6;
        let builder = ChromatogramBuilder::new(p, ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert!(result.table.is_empty());
        Ok(())
    }

    #[test]
    fn test_edge_zeros() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 10, |i| {
            if (2..8).contains(&i) {
                vec![(250.0, 500.0)]
            } else {
                vec![(900.0, 1.0)]
            }
        });
        let mut p = params();
        p.add_edge_zeros = true;
        let builder = ChromatogramBuilder::new(p, ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        let feature = result.table.rows()[0].feature(0).unwrap();
        assert_eq!(feature.len(), 8);
        assert_eq!(feature.points[0].intensity, 0.0);
        assert_eq!(feature.points[0].scan_index, 1);
        assert_eq!(feature.points[7].scan_index, 8);
        assert_eq!(feature.intensity_range.0, 0.0);
        Ok(())
    }

    #[test]
    fn test_no_matching_scans() {
        let sample = make_sample(0, 4, |_| vec![(100.0, 1000.0)]);
        let selection = ScanSelection::default().with_time_range(50.0, 60.0);
        let builder = ChromatogramBuilder::new(params(), selection);
        let err = builder.build(&sample, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ChromatogramError::NoMatchingScans { .. }));

        let empty = RawSample::new(SampleInfo::new(SampleId(1), "empty"), Vec::new());
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        assert!(builder.build(&empty, &CancellationToken::new()).is_err());
    }

    #[test]
    fn test_missing_mass_list() {
        let mut sample = make_sample(0, 4, |_| vec![(100.0, 1000.0)]);
        sample.scans[2].peaks = None;
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        match builder.build(&sample, &CancellationToken::new()) {
            Err(ChromatogramError::MissingMassList { scan_id, index, .. }) => {
                assert_eq!(scan_id, "scan=3");
                assert_eq!(index, 2);
            }
            other => panic!("expected a missing mass list error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_monotonic_time() {
        let mut sample = make_sample(0, 4, |_| vec![(100.0, 1000.0)]);
        sample.scans[3].time = 0.01;
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let err = builder.build(&sample, &CancellationToken::new()).unwrap_err();
        assert!(matches!(
            err,
            ChromatogramError::NonMonotonicRetentionTime { ref scan_id, .. } if scan_id == "scan=4"
        ));
    }

    #[test_log::test]
    fn test_mixed_polarity_warns() -> Result<(), ChromatogramError> {
        let mut sample = make_sample(0, 6, |_| vec![(100.0, 1000.0)]);
        sample.scans[5].polarity = ScanPolarity::Negative;
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            result.warnings[0],
            DataQualityWarning::MixedPolarities { .. }
        ));
        assert_eq!(result.table.len(), 1);
        Ok(())
    }

    #[test_log::test]
    fn test_mixed_ms_levels_warns() -> Result<(), ChromatogramError> {
        let mut sample = make_sample(0, 6, |_| vec![(100.0, 1000.0)]);
        sample.scans[2].ms_level = 2;
        let builder = ChromatogramBuilder::new(params(), ScanSelection::any());
        let result = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(
            result.warnings,
            vec![DataQualityWarning::MixedMsLevels {
                sample: sample.name().to_string(),
                levels: vec![1, 2],
            }]
        );
        assert_eq!(result.table.len(), 1);
        Ok(())
    }

    #[test]
    fn test_cancelled() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 6, |_| vec![(100.0, 1000.0)]);
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let token = CancellationToken::new();
        token.cancel();
        assert!(builder.build(&sample, &token)?.is_cancelled());
        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<(), ChromatogramError> {
        let sample = make_sample(0, 15, |i| {
            (0..25)
                .map(|k| (150.0 + k as f64 * 0.013, profile(i, 3 + k % 9, 2000.0 + k as f32)))
                .collect()
        });
        let builder = ChromatogramBuilder::new(params(), ScanSelection::default());
        let a = completed(builder.build(&sample, &CancellationToken::new())?);
        let b = completed(builder.build(&sample, &CancellationToken::new())?);
        assert_eq!(a.table, b.table);
        Ok(())
    }
}
