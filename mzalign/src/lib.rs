//! Build extracted ion chromatograms from centroided LC-MS scans, align the
//! resulting per-sample feature tables with a pluggable scoring strategy, and
//! fill the remaining alignment gaps from the raw scans.
//!
//! The three stages are exposed individually through [`chromatogram`], [`align`]
//! and [`gap_fill`], and chained together by [`api::run_pipeline`].
pub mod align;
pub mod api;
pub mod chromatogram;
pub mod feature;
pub mod gap_fill;
pub mod interval;
pub mod scan;
pub mod table;
pub mod task;
pub mod tolerance;

pub use align::{
    AlignmentError, AlignmentParams, AlignmentPath, RetentionTimeScorer, ScoreAligner,
    ScoreCalculator, ScoreType, DEFAULT_GAP_PENALTY,
};
pub use api::{run_pipeline, PipelineError, PipelineOutput, PipelineParams};
pub use chromatogram::{
    ChromatogramBuilder, ChromatogramError, ChromatogramParams, ChromatogramSet,
    DataQualityWarning,
};
pub use feature::{Feature, FeaturePoint, FeatureStatus};
pub use gap_fill::{GapFillError, GapFillParams, GapFiller};
pub use scan::{RawSample, SampleId, SampleInfo, Scan, ScanSelection};
pub use table::{FeatureRow, FeatureTable};
pub use task::{CancellationToken, TaskOutcome};
pub use tolerance::RtTolerance;

pub use mzpeaks::Tolerance;
