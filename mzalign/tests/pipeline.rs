use mzdata::spectrum::ScanPolarity;
use mzpeaks::{CentroidPeak, Tolerance};

use mzalign::scan::PeakList;
use mzalign::{
    run_pipeline, CancellationToken, ChromatogramError, FeatureStatus, GapFillParams,
    PipelineError, PipelineParams, RawSample, RtTolerance, SampleId, SampleInfo, Scan,
    ScanSelection, TaskOutcome,
};

const N_SCANS: usize = 40;

/// A triangular elution profile over `width` scans either side of `apex`
fn profile(i: usize, apex: usize, height: f32, width: usize) -> Option<f32> {
    let distance = (i as i64 - apex as i64).unsigned_abs() as usize;
    (distance < width).then(|| height * (1.0 - distance as f32 / width as f32))
}

/// Compound X elutes in every sample. Compound Y is only detectable in the
/// first two, and leaves a weak trace in the third.
fn make_sample(id: usize) -> RawSample {
    let shift = if id == 1 { 1 } else { 0 };
    let x_mz = 300.15 + id as f64 * 0.0005;
    let y_mz = 450.2 - id as f64 * 0.0004;
    let scans = (0..N_SCANS)
        .map(|i| {
            let mut peaks = vec![CentroidPeak::new(150.0, 50.0, 0)];
            if let Some(intensity) = profile(i, 20 + shift, 10000.0, 8) {
                peaks.push(CentroidPeak::new(x_mz, intensity, 0));
            }
            let y_height = if id == 2 { 300.0 } else { 6000.0 };
            if let Some(intensity) = profile(i, 25 + shift, y_height, 6) {
                peaks.push(CentroidPeak::new(y_mz, intensity, 0));
            }
            let peaks: PeakList = peaks.into_iter().collect();
            Scan::new(
                i,
                format!("scan={}", i + 1),
                i as f64 * 0.05,
                1,
                ScanPolarity::Positive,
                None,
                Some(peaks),
            )
        })
        .collect();
    RawSample::new(SampleInfo::new(SampleId(id), format!("sample-{id}")), scans)
}

fn params(gap_fill: bool) -> PipelineParams {
    let mut params = PipelineParams::default();
    params.scorer.mz_tolerance = Tolerance::PPM(10.0);
    params.scorer.rt_tolerance = RtTolerance::Absolute(0.1);
    params.alignment.threads = Some(2);
    if gap_fill {
        params.gap_fill = Some(GapFillParams::new(Tolerance::PPM(10.0), ScanSelection::default()));
    }
    params
}

#[test_log::test]
fn test_three_sample_pipeline() -> Result<(), PipelineError> {
    let samples: Vec<RawSample> = (0..3).map(make_sample).collect();
    let output = run_pipeline(&samples, &params(true), &CancellationToken::new())?
        .completed()
        .unwrap();

    assert_eq!(output.chromatograms.len(), 3);
    assert_eq!(output.chromatograms[0].table.len(), 2);
    assert_eq!(output.chromatograms[1].table.len(), 2);
    assert_eq!(output.chromatograms[2].table.len(), 1);

    let table = output.table;
    let ids: Vec<SampleId> = table.samples().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![SampleId(0), SampleId(1), SampleId(2)]);
    assert_eq!(table.len(), 2);

    let x = &table.rows()[0];
    assert_eq!(x.id, 1);
    assert_eq!(x.count(), 3);
    assert!((x.average_mz() - 300.1505).abs() < 1e-3);
    assert!(x.features().all(|(_, f)| f.status == FeatureStatus::Detected));

    let y = &table.rows()[1];
    assert_eq!(y.id, 2);
    assert_eq!(y.count(), 2);
    let estimated = y.feature(2).unwrap();
    assert_eq!(estimated.status, FeatureStatus::Estimated);
    assert_eq!(estimated.height, 300.0);
    assert!(!y.has_gaps());
    Ok(())
}

#[test]
fn test_without_gap_filling() -> Result<(), PipelineError> {
    let samples: Vec<RawSample> = (0..3).map(make_sample).collect();
    let first = run_pipeline(&samples, &params(false), &CancellationToken::new())?
        .completed()
        .unwrap();
    let second = run_pipeline(&samples, &params(false), &CancellationToken::new())?
        .completed()
        .unwrap();
    assert_eq!(first.table, second.table);
    let y = &first.table.rows()[1];
    assert!(y.feature(2).is_none());
    assert_eq!(y.gaps().collect::<Vec<_>>(), vec![2]);
    Ok(())
}

#[test]
fn test_no_matching_scans_is_fatal() {
    let samples: Vec<RawSample> = (0..2).map(make_sample).collect();
    let mut params = params(true);
    params.selection = ScanSelection::new(Some(2), None, None);
    let err = run_pipeline(&samples, &params, &CancellationToken::new()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ChromatogramError(ChromatogramError::NoMatchingScans { .. })
    ));
}

#[test]
fn test_cancelled_pipeline() -> Result<(), PipelineError> {
    let samples: Vec<RawSample> = (0..3).map(make_sample).collect();
    let token = CancellationToken::new();
    token.cancel();
    let outcome = run_pipeline(&samples, &params(true), &token)?;
    assert!(matches!(outcome, TaskOutcome::Cancelled));
    Ok(())
}
