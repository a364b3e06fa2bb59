//! Greedy, score driven alignment of per-sample feature tables into one table.
//!
//! Tables are treated as columns, ordered by descending row count. Alignment
//! proceeds in rounds. Each round every unmatched row of the leftmost column
//! that still has rows seeds one [`AlignmentPath`], built by picking the best
//! matching unmatched row of each other column or recording a gap. The best
//! scoring non-conflicting paths are committed and their rows removed from
//! further consideration, until no rows remain.
use std::io;
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::scan::SampleInfo;
use crate::table::{FeatureRow, FeatureTable};
use crate::task::{CancellationToken, TaskOutcome};

mod path;
mod rounds;
mod scorer;

pub use path::AlignmentPath;
pub use scorer::{RetentionTimeScorer, ScoreCalculator, ScoreType, DEFAULT_GAP_PENALTY};

use rounds::RoundController;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Failed to start an alignment worker thread: {0}")]
    WorkerSpawn(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The gap penalty must be a positive finite number, got {0}")]
    InvalidGapPenalty(ScoreType),
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentParams {
    /// The score added for each column a path leaves empty. A candidate is
    /// only accepted if it scores below this value.
    pub gap_penalty: ScoreType,
    /// The number of worker threads, defaulting to the available parallelism
    pub threads: Option<usize>,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            gap_penalty: DEFAULT_GAP_PENALTY,
            threads: None,
        }
    }
}

impl AlignmentParams {
    pub fn new(gap_penalty: ScoreType, threads: Option<usize>) -> Self {
        Self {
            gap_penalty,
            threads,
        }
    }

    fn worker_count(&self) -> usize {
        self.threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }
}

#[derive(Debug, Clone)]
pub struct ScoreAligner<S: ScoreCalculator> {
    scorer: S,
    params: AlignmentParams,
}

impl<S: ScoreCalculator> ScoreAligner<S> {
    pub fn new(scorer: S, params: AlignmentParams) -> Self {
        Self { scorer, params }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn params(&self) -> &AlignmentParams {
        &self.params
    }

    /// Align `tables` into one table whose samples are ordered by first
    /// appearance across the row-count-sorted input tables.
    ///
    /// Output rows are numbered from 1 in commit order. Rows the scorer
    /// rejects as invalid are passed through unaligned after all the
    /// committed rows.
    #[instrument(level = "debug", skip_all, fields(n_tables = tables.len()))]
    pub fn align(
        &self,
        tables: &[FeatureTable],
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome<FeatureTable>, AlignmentError> {
        let gap_penalty = self.params.gap_penalty;
        if !(gap_penalty.is_finite() && gap_penalty > 0.0) {
            return Err(AlignmentError::InvalidGapPenalty(gap_penalty));
        }
        let started = Instant::now();

        let mut columns: Vec<FeatureTable> = tables.to_vec();
        columns.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut samples: Vec<SampleInfo> = Vec::new();
        for table in columns.iter() {
            for sample in table.samples() {
                if !samples.iter().any(|s| s.id == sample.id) {
                    samples.push(sample.clone());
                }
            }
        }
        // For each column, the output slot of each of its own sample slots
        let slot_maps: Vec<Vec<usize>> = columns
            .iter()
            .map(|table| {
                table
                    .samples()
                    .iter()
                    .filter_map(|sample| samples.iter().position(|s| s.id == sample.id))
                    .collect()
            })
            .collect();

        let mut pools: Vec<Vec<usize>> = Vec::with_capacity(columns.len());
        let mut invalid: Vec<(usize, usize)> = Vec::new();
        for (column, table) in columns.iter().enumerate() {
            let mut pool = Vec::with_capacity(table.len());
            for (i, row) in table.iter().enumerate() {
                if self.scorer.is_valid(row) {
                    pool.push(i);
                } else {
                    invalid.push((column, i));
                }
            }
            pools.push(pool);
        }
        if !invalid.is_empty() {
            warn!("{} rows were rejected by the scorer and will not be aligned", invalid.len());
        }

        let n_workers = self.params.worker_count();
        let controller = RoundController::new(&columns, pools, &self.scorer, gap_penalty, cancel);
        let Some(paths) = controller.run(n_workers)? else {
            return Ok(TaskOutcome::Cancelled);
        };

        let groups = paths
            .iter()
            .map(|path| path.rows().collect::<Vec<_>>())
            .chain(invalid.iter().map(|member| vec![*member]));

        let mut rows: Vec<FeatureRow> = Vec::with_capacity(paths.len() + invalid.len());
        for members in groups {
            let mut row = FeatureRow::new(rows.len() + 1, samples.len());
            for (column, index) in members {
                let source = &columns[column].rows()[index];
                for (slot, feature) in source.features() {
                    if let Some(out_slot) = slot_maps[column].get(slot) {
                        row.add_feature(*out_slot, feature.clone());
                    }
                }
            }
            rows.push(row);
        }

        info!(
            "Aligned {} tables into {} rows over {} samples in {:0.3?}",
            columns.len(),
            rows.len(),
            samples.len(),
            started.elapsed()
        );
        Ok(TaskOutcome::Completed(FeatureTable::with_rows(
            "aligned".to_string(),
            samples,
            rows,
        )))
    }
}
