use crate::table::FeatureRow;

use super::scorer::ScoreType;

/// A candidate aligned row under construction.
///
/// Holds one slot per column, either the index of the row chosen from that
/// column or a gap. The centroid used to score later candidates is a running
/// mean over the rows added so far, so the order columns are visited in is
/// part of the result.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentPath {
    slots: Vec<Option<usize>>,
    seed_column: usize,
    n_filled: usize,
    mz_sum: f64,
    rt_sum: f64,
    score: ScoreType,
}

impl AlignmentPath {
    /// Start a path anchored on `row`, the `seed_row`-th row of `seed_column`
    pub fn new(n_columns: usize, seed_column: usize, seed_row: usize, row: &FeatureRow) -> Self {
        let mut path = Self {
            slots: vec![None; n_columns],
            seed_column,
            n_filled: 0,
            mz_sum: 0.0,
            rt_sum: 0.0,
            score: 0.0,
        };
        path.add(seed_column, seed_row, row, 0.0);
        path
    }

    pub fn add(&mut self, column: usize, row_index: usize, row: &FeatureRow, score: ScoreType) {
        self.slots[column] = Some(row_index);
        self.n_filled += 1;
        self.mz_sum += row.average_mz();
        self.rt_sum += row.average_rt();
        self.score += score;
    }

    pub fn add_gap(&mut self, column: usize, penalty: ScoreType) {
        self.slots[column] = None;
        self.score += penalty;
    }

    pub fn mz(&self) -> f64 {
        self.mz_sum / self.n_filled as f64
    }

    pub fn rt(&self) -> f64 {
        self.rt_sum / self.n_filled as f64
    }

    pub fn score(&self) -> ScoreType {
        self.score
    }

    pub fn n_filled(&self) -> usize {
        self.n_filled
    }

    pub fn seed_column(&self) -> usize {
        self.seed_column
    }

    pub fn slot(&self, column: usize) -> Option<usize> {
        self.slots.get(column).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    /// Iterate over `(column, row index)` pairs of the filled slots
    pub fn rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(column, row)| row.map(|row| (column, row)))
    }

    /// Two paths conflict when they claim the same row of at least one column.
    ///
    /// This is not an equivalence relation and is deliberately not `PartialEq`.
    pub fn conflicts_with(&self, other: &AlignmentPath) -> bool {
        self.slots
            .iter()
            .zip(other.slots.iter())
            .any(|(a, b)| matches!((a, b), (Some(a), Some(b)) if a == b))
    }
}
