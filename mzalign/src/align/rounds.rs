//! The round structure of the score aligner.
//!
//! A [`RoundController`] owns one pool of unmatched row indices per column.
//! Each round it hands the rows of the leftmost non-empty column to a fixed
//! set of worker threads in contiguous chunks, waits for one report per chunk,
//! then resolves conflicts between the returned paths and removes the rows the
//! committed paths consumed. Workers only read the pools, and the controller
//! only writes them while no round is in flight.
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{PoisonError, RwLock};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use identity_hash::BuildIdentityHasher;
use tracing::{debug, trace, warn};

use crate::table::FeatureTable;
use crate::task::CancellationToken;

use super::path::AlignmentPath;
use super::scorer::{ScoreCalculator, ScoreType};
use super::AlignmentError;

type IndexSet = HashSet<usize, BuildIdentityHasher<usize>>;

#[derive(Debug)]
struct RoundTask {
    round: usize,
    chunk: usize,
    seed_column: usize,
    seeds: Vec<usize>,
}

#[derive(Debug)]
enum WorkerReport {
    Paths {
        round: usize,
        chunk: usize,
        paths: Vec<AlignmentPath>,
    },
    Cancelled,
    Failed {
        round: usize,
        chunk: usize,
    },
}

pub(crate) struct RoundController<'a, S: ScoreCalculator> {
    columns: &'a [FeatureTable],
    pools: RwLock<Vec<Vec<usize>>>,
    scorer: &'a S,
    gap_penalty: ScoreType,
    cancel: &'a CancellationToken,
}

impl<'a, S: ScoreCalculator> RoundController<'a, S> {
    pub(crate) fn new(
        columns: &'a [FeatureTable],
        pools: Vec<Vec<usize>>,
        scorer: &'a S,
        gap_penalty: ScoreType,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            columns,
            pools: RwLock::new(pools),
            scorer,
            gap_penalty,
            cancel,
        }
    }

    /// Run rounds until every pool is empty, returning the committed paths in
    /// commit order, or `None` if the run was cancelled or a worker failed.
    pub(crate) fn run(
        &self,
        n_workers: usize,
    ) -> Result<Option<Vec<AlignmentPath>>, AlignmentError> {
        let n_workers = n_workers.max(1);
        thread::scope(|scope| -> Result<Option<Vec<AlignmentPath>>, AlignmentError> {
            let (task_sender, task_receiver) = crossbeam_channel::unbounded::<RoundTask>();
            let (report_sender, report_receiver) = crossbeam_channel::unbounded::<WorkerReport>();

            let mut handles = Vec::with_capacity(n_workers);
            for i in 0..n_workers {
                let tasks = task_receiver.clone();
                let reports = report_sender.clone();
                let handle = thread::Builder::new()
                    .name(format!("align-worker-{i}"))
                    .spawn_scoped(scope, move || self.worker_loop(tasks, reports))?;
                handles.push(handle);
            }
            drop(task_receiver);
            drop(report_sender);

            let committed = self.drive(&task_sender, &report_receiver, n_workers);

            drop(task_sender);
            for handle in handles {
                if let Err(e) = handle.join() {
                    warn!("An alignment worker exited abnormally: {e:?}");
                }
            }
            Ok(committed)
        })
    }

    fn drive(
        &self,
        tasks: &Sender<RoundTask>,
        reports: &Receiver<WorkerReport>,
        n_workers: usize,
    ) -> Option<Vec<AlignmentPath>> {
        let mut committed: Vec<AlignmentPath> = Vec::new();
        let mut round = 0;
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            let (seed_column, seeds) = {
                let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
                match pools.iter().position(|pool| !pool.is_empty()) {
                    Some(column) => (column, pools[column].clone()),
                    None => break,
                }
            };
            round += 1;

            let chunk_size = seeds.len().div_ceil(n_workers);
            let mut n_chunks = 0;
            for (chunk, seeds) in seeds.chunks(chunk_size).enumerate() {
                let task = RoundTask {
                    round,
                    chunk,
                    seed_column,
                    seeds: seeds.to_vec(),
                };
                if tasks.send(task).is_err() {
                    return None;
                }
                n_chunks += 1;
            }

            let mut chunks: Vec<Option<Vec<AlignmentPath>>> = vec![None; n_chunks];
            let mut aborted = false;
            for _ in 0..n_chunks {
                match reports.recv() {
                    Ok(WorkerReport::Paths {
                        round: r,
                        chunk,
                        paths,
                    }) => {
                        debug_assert_eq!(r, round);
                        chunks[chunk] = Some(paths);
                    }
                    Ok(WorkerReport::Cancelled) => {
                        aborted = true;
                    }
                    Ok(WorkerReport::Failed {
                        round: failed_round,
                        chunk,
                    }) => {
                        warn!("Alignment worker failed on chunk {chunk} of round {failed_round}");
                        aborted = true;
                    }
                    Err(_) => return None,
                }
            }
            if aborted {
                return None;
            }

            let mut paths: Vec<AlignmentPath> = chunks.into_iter().flatten().flatten().collect();
            let n_paths = paths.len();
            paths.sort_by(|a, b| a.score().total_cmp(&b.score()));
            let round_committed = self.resolve_conflicts(paths);
            debug!(
                "Round {round}: column {seed_column} seeded {} paths, committed {}",
                n_paths,
                round_committed.len()
            );
            committed.extend(round_committed);
        }
        debug!("Alignment converged after {round} rounds");
        Some(committed)
    }

    /// Commit the best path, discard every path that conflicts with it, and
    /// repeat. Consumed rows are removed from the pools before returning.
    fn resolve_conflicts(&self, paths: Vec<AlignmentPath>) -> Vec<AlignmentPath> {
        let mut remaining: VecDeque<AlignmentPath> = paths.into();
        let mut consumed: Vec<IndexSet> =
            (0..self.columns.len()).map(|_| IndexSet::default()).collect();
        let mut committed = Vec::new();
        while let Some(best) = remaining.pop_front() {
            remaining.retain(|path| !path.conflicts_with(&best));
            for (column, row) in best.rows() {
                consumed[column].insert(row);
            }
            committed.push(best);
        }

        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        for (pool, used) in pools.iter_mut().zip(consumed.iter()) {
            if !used.is_empty() {
                pool.retain(|row| !used.contains(row));
            }
        }
        committed
    }

    fn worker_loop(&self, tasks: Receiver<RoundTask>, reports: Sender<WorkerReport>) {
        for task in tasks.iter() {
            let report = match panic::catch_unwind(AssertUnwindSafe(|| self.build_paths(&task))) {
                Ok(Some(paths)) => WorkerReport::Paths {
                    round: task.round,
                    chunk: task.chunk,
                    paths,
                },
                Ok(None) => WorkerReport::Cancelled,
                Err(_) => WorkerReport::Failed {
                    round: task.round,
                    chunk: task.chunk,
                },
            };
            if reports.send(report).is_err() {
                break;
            }
        }
    }

    fn build_paths(&self, task: &RoundTask) -> Option<Vec<AlignmentPath>> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let mut paths = Vec::with_capacity(task.seeds.len());
        for seed in task.seeds.iter().copied() {
            if self.cancel.is_cancelled() {
                return None;
            }
            paths.push(self.build_path(&pools, task.seed_column, seed));
        }
        Some(paths)
    }

    /// Build the path seeded on `seed_row`, visiting the other columns
    /// cyclically starting after `seed_column`
    fn build_path(&self, pools: &[Vec<usize>], seed_column: usize, seed_row: usize) -> AlignmentPath {
        let n_columns = self.columns.len();
        let mut path = AlignmentPath::new(
            n_columns,
            seed_column,
            seed_row,
            &self.columns[seed_column].rows()[seed_row],
        );

        for offset in 1..n_columns {
            let column = (seed_column + offset) % n_columns;
            let rows = self.columns[column].rows();
            let mut best: Option<usize> = None;
            let mut best_score = self.scorer.worst_score();
            for candidate in pools[column].iter().copied() {
                let row = &rows[candidate];
                let score = self.scorer.score(&path, row);
                if score < best_score && self.scorer.matches(&path, row) {
                    best = Some(candidate);
                    best_score = score;
                }
            }
            match best {
                Some(candidate) if best_score < self.gap_penalty => {
                    path.add(column, candidate, &rows[candidate], best_score);
                }
                _ => path.add_gap(column, self.gap_penalty),
            }
        }
        trace!(
            "Path from column {seed_column} row {seed_row} filled {} of {n_columns} with score {}",
            path.n_filled(),
            path.score()
        );
        path
    }
}
