//! Run chromatogram building, alignment and gap filling end to end
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, instrument};

use crate::align::{AlignmentError, AlignmentParams, RetentionTimeScorer, ScoreAligner};
use crate::chromatogram::{ChromatogramBuilder, ChromatogramError, ChromatogramParams, ChromatogramSet};
use crate::gap_fill::{GapFillError, GapFillParams, GapFiller};
use crate::scan::{RawSample, ScanSelection};
use crate::table::FeatureTable;
use crate::task::{CancellationToken, TaskOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("An error occurred while building chromatograms: {0}")]
    ChromatogramError(
        #[source]
        #[from]
        ChromatogramError,
    ),
    #[error("An error occurred during alignment: {0}")]
    AlignmentError(
        #[source]
        #[from]
        AlignmentError,
    ),
    #[error("An error occurred during gap filling: {0}")]
    GapFillError(
        #[source]
        #[from]
        GapFillError,
    ),
}

#[derive(Debug, Clone, Default)]
pub struct PipelineParams {
    pub selection: ScanSelection,
    pub chromatogram: ChromatogramParams,
    pub alignment: AlignmentParams,
    pub scorer: RetentionTimeScorer,
    /// Skip gap filling when `None`
    pub gap_fill: Option<GapFillParams>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: FeatureTable,
    /// The chromatograms of each input sample, in input order
    pub chromatograms: Vec<ChromatogramSet>,
}

#[instrument(level = "debug", skip_all, fields(n_samples = samples.len()))]
pub fn run_pipeline(
    samples: &[RawSample],
    params: &PipelineParams,
    cancel: &CancellationToken,
) -> Result<TaskOutcome<PipelineOutput>, PipelineError> {
    let started = Instant::now();
    let builder = ChromatogramBuilder::new(params.chromatogram, params.selection);

    let built: Vec<TaskOutcome<ChromatogramSet>> = samples
        .par_iter()
        .map(|sample| builder.build(sample, cancel))
        .collect::<Result<_, _>>()?;
    let Some(chromatograms) = built
        .into_iter()
        .map(TaskOutcome::completed)
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(TaskOutcome::Cancelled);
    };
    let tables: Vec<FeatureTable> = chromatograms.iter().map(|c| c.table.clone()).collect();

    let aligner = ScoreAligner::new(params.scorer, params.alignment);
    let TaskOutcome::Completed(mut table) = aligner.align(&tables, cancel)? else {
        return Ok(TaskOutcome::Cancelled);
    };

    if let Some(gap_fill) = params.gap_fill.as_ref() {
        let filler = GapFiller::new(gap_fill.clone());
        table = match filler.fill(&table, samples, cancel)? {
            TaskOutcome::Completed(table) => table,
            TaskOutcome::Cancelled => return Ok(TaskOutcome::Cancelled),
        };
    }

    info!(
        "Processed {} samples into {} aligned rows in {:0.3?}",
        samples.len(),
        table.len(),
        started.elapsed()
    );
    Ok(TaskOutcome::Completed(PipelineOutput {
        table,
        chromatograms,
    }))
}
