//! Recover estimated features for the empty cells of an aligned table by
//! re-reading the raw scans of the samples that lack them.
use std::time::Instant;

use mzpeaks::Tolerance;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::feature::{trim_zero_edges, Feature, FeaturePoint, FeatureStatus};
use crate::scan::{RawSample, Scan, ScanSelection};
use crate::table::{FeatureRow, FeatureTable};
use crate::task::{CancellationToken, TaskOutcome};
use crate::tolerance::widen_mz_range;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GapFillError {
    #[error("No raw data was provided for sample {0}")]
    MissingRawSample(String),
    #[error("Scan {scan_id} (index {index}) of {sample} does not have a centroided mass list")]
    MissingMassList {
        sample: String,
        scan_id: String,
        index: usize,
    },
}

#[derive(Debug, Clone)]
pub struct GapFillParams {
    /// The tolerance used to widen a row's m/z envelope
    pub mz_tolerance: Tolerance,
    pub selection: ScanSelection,
}

impl Default for GapFillParams {
    fn default() -> Self {
        Self {
            mz_tolerance: Tolerance::PPM(10.0),
            selection: ScanSelection::default(),
        }
    }
}

impl GapFillParams {
    pub fn new(mz_tolerance: Tolerance, selection: ScanSelection) -> Self {
        Self {
            mz_tolerance,
            selection,
        }
    }
}

/// The raw scans of one table sample, restricted by the scan selection
struct SampleScans<'a> {
    raw: &'a RawSample,
    scans: Vec<&'a Scan>,
}

/// The m/z and retention time window spanned by the features present in a row
#[derive(Debug, Clone, Copy, PartialEq)]
struct Envelope {
    mz: (f64, f64),
    rt: (f64, f64),
}

impl Envelope {
    fn of_row(row: &FeatureRow, tolerance: &Tolerance) -> Option<Self> {
        let mut features = row.features().map(|(_, f)| f);
        let first = features.next()?;
        let (mut mz, mut rt) = (first.mz_range, first.rt_range);
        for f in features {
            mz = (mz.0.min(f.mz_range.0), mz.1.max(f.mz_range.1));
            rt = (rt.0.min(f.rt_range.0), rt.1.max(f.rt_range.1));
        }
        Some(Self {
            mz: widen_mz_range(tolerance, mz.0, mz.1),
            rt,
        })
    }

    fn centre_mz(&self) -> f64 {
        (self.mz.0 + self.mz.1) / 2.0
    }

    fn contains_time(&self, time: f64) -> bool {
        self.rt.0 <= time && time <= self.rt.1
    }
}

#[derive(Debug, Default, Clone)]
pub struct GapFiller {
    pub params: GapFillParams,
}

impl GapFiller {
    pub fn new(params: GapFillParams) -> Self {
        Self { params }
    }

    /// Fill the gaps of `table` from `raw_samples`, returning a new table with
    /// the same rows, row order and sample order.
    ///
    /// Only empty cells change. Raw data is only required for samples that
    /// have at least one gap.
    #[instrument(level = "debug", skip_all, fields(table = %table.name, n_rows = table.len()))]
    pub fn fill(
        &self,
        table: &FeatureTable,
        raw_samples: &[RawSample],
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome<FeatureTable>, GapFillError> {
        let started = Instant::now();
        let sources = self.resolve_samples(table, raw_samples)?;

        let filled: Result<Vec<Option<FeatureRow>>, GapFillError> = table
            .rows()
            .par_iter()
            .map(|row| {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                self.fill_row(row, &sources).map(Some)
            })
            .collect();
        let Some(rows) = filled?.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(TaskOutcome::Cancelled);
        };

        let n_gaps_before: usize = table.iter().map(|r| r.gaps().count()).sum();
        let n_gaps_after: usize = rows.iter().map(|r| r.gaps().count()).sum();
        info!(
            "Filled {} of {} gaps in {} in {:0.3?}",
            n_gaps_before - n_gaps_after,
            n_gaps_before,
            table.name,
            started.elapsed()
        );
        Ok(TaskOutcome::Completed(FeatureTable::with_rows(
            table.name.clone(),
            table.samples().to_vec(),
            rows,
        )))
    }

    fn resolve_samples<'a>(
        &self,
        table: &FeatureTable,
        raw_samples: &'a [RawSample],
    ) -> Result<Vec<Option<SampleScans<'a>>>, GapFillError> {
        table
            .samples()
            .iter()
            .enumerate()
            .map(|(slot, info)| {
                if !table.iter().any(|row| row.feature(slot).is_none()) {
                    return Ok(None);
                }
                let raw = raw_samples
                    .iter()
                    .find(|raw| raw.id() == info.id)
                    .ok_or_else(|| GapFillError::MissingRawSample(info.name.clone()))?;
                let scans = raw.select(&self.params.selection);
                debug!("{} selected {} scans for gap filling", info.name, scans.len());
                Ok(Some(SampleScans { raw, scans }))
            })
            .collect()
    }

    fn fill_row(
        &self,
        row: &FeatureRow,
        sources: &[Option<SampleScans<'_>>],
    ) -> Result<FeatureRow, GapFillError> {
        let mut row = row.clone();
        if !row.has_gaps() {
            return Ok(row);
        }
        let Some(envelope) = Envelope::of_row(&row, &self.params.mz_tolerance) else {
            return Ok(row);
        };
        let gaps: Vec<usize> = row.gaps().collect();
        for slot in gaps {
            let Some(source) = sources.get(slot).and_then(|s| s.as_ref()) else {
                continue;
            };
            if let Some(feature) = self.estimate(source, &envelope)? {
                row.fill_gap(slot, feature);
            }
        }
        Ok(row)
    }

    fn estimate(
        &self,
        source: &SampleScans<'_>,
        envelope: &Envelope,
    ) -> Result<Option<Feature>, GapFillError> {
        let (low, high) = envelope.mz;
        let mut points = Vec::new();
        for scan in source
            .scans
            .iter()
            .filter(|scan| envelope.contains_time(scan.time))
        {
            if !scan.has_mass_list() {
                return Err(GapFillError::MissingMassList {
                    sample: source.raw.name().to_string(),
                    scan_id: scan.id.clone(),
                    index: scan.index,
                });
            }
            let point = match scan.most_intense_between(low, high) {
                Some(peak) => FeaturePoint::new(scan.index, scan.time, peak.mz, peak.intensity),
                None => FeaturePoint::new(scan.index, scan.time, envelope.centre_mz(), 0.0),
            };
            points.push(point);
        }
        trim_zero_edges(&mut points);

        let fragments = source.raw.fragment_scans(envelope.mz, envelope.rt);
        Ok(
            Feature::from_points(source.raw.id(), FeatureStatus::Estimated, points)
                .map(|f| f.with_fragment_scans(fragments)),
        )
    }
}
