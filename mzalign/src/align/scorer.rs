//! Strategies for scoring a candidate row against a partially built alignment path
use mzpeaks::Tolerance;

use crate::table::FeatureRow;
use crate::tolerance::RtTolerance;

use super::path::AlignmentPath;

pub type ScoreType = f64;

/// The score a path accumulates for every column it leaves empty.
pub const DEFAULT_GAP_PENALTY: ScoreType = 1.25;

/// Scores candidate rows against an [`AlignmentPath`]. Lower scores are better.
///
/// A finite score does not make a candidate acceptable, [`ScoreCalculator::matches`]
/// decides that.
pub trait ScoreCalculator: Send + Sync {
    fn score(&self, path: &AlignmentPath, row: &FeatureRow) -> ScoreType;

    fn matches(&self, path: &AlignmentPath, row: &FeatureRow) -> bool;

    /// An upper bound on [`ScoreCalculator::score`], used as the starting best score
    fn worst_score(&self) -> ScoreType {
        ScoreType::MAX
    }

    /// Whether `row` may take part in alignment at all
    fn is_valid(&self, row: &FeatureRow) -> bool {
        row.count() > 0
    }
}

impl<T: ScoreCalculator + ?Sized> ScoreCalculator for Box<T> {
    fn score(&self, path: &AlignmentPath, row: &FeatureRow) -> ScoreType {
        (**self).score(path, row)
    }

    fn matches(&self, path: &AlignmentPath, row: &FeatureRow) -> bool {
        (**self).matches(path, row)
    }

    fn worst_score(&self) -> ScoreType {
        (**self).worst_score()
    }

    fn is_valid(&self, row: &FeatureRow) -> bool {
        (**self).is_valid(row)
    }
}

/// Scores candidates by their m/z and retention time distance from the path
/// centroid, each normalized by the half width of its tolerance window.
///
/// ```math
/// s = \frac{|mz_{row} - mz_{path}|}{w_{mz}} + \frac{|rt_{row} - rt_{path}|}{w_{rt}}
/// ```
///
/// so a matching candidate scores in `[0, 2]`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetentionTimeScorer {
    pub mz_tolerance: Tolerance,
    pub rt_tolerance: RtTolerance,
}

impl Default for RetentionTimeScorer {
    fn default() -> Self {
        Self {
            mz_tolerance: Tolerance::PPM(10.0),
            rt_tolerance: RtTolerance::default(),
        }
    }
}

impl RetentionTimeScorer {
    pub fn new(mz_tolerance: Tolerance, rt_tolerance: RtTolerance) -> Self {
        Self {
            mz_tolerance,
            rt_tolerance,
        }
    }

    fn normalized(delta: f64, half_width: f64) -> ScoreType {
        if half_width > 0.0 {
            delta / half_width
        } else if delta == 0.0 {
            0.0
        } else {
            ScoreType::INFINITY
        }
    }
}

impl ScoreCalculator for RetentionTimeScorer {
    fn score(&self, path: &AlignmentPath, row: &FeatureRow) -> ScoreType {
        if !self.matches(path, row) {
            return self.worst_score();
        }
        let (lo, hi) = self.mz_tolerance.bounds(path.mz());
        let mz_score = Self::normalized((row.average_mz() - path.mz()).abs(), (hi - lo) / 2.0);
        let rt_score = Self::normalized(
            (row.average_rt() - path.rt()).abs(),
            self.rt_tolerance.half_width(path.rt()),
        );
        (mz_score + rt_score).min(self.worst_score())
    }

    fn matches(&self, path: &AlignmentPath, row: &FeatureRow) -> bool {
        let (lo, hi) = self.mz_tolerance.bounds(path.mz());
        let mz = row.average_mz();
        lo <= mz && mz <= hi && self.rt_tolerance.test(row.average_rt(), path.rt())
    }

    fn is_valid(&self, row: &FeatureRow) -> bool {
        row.count() > 0 && row.average_mz().is_finite() && row.average_rt().is_finite()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::table::test_data::make_feature;

    fn row(mz: f64, rt: f64) -> FeatureRow {
        let mut row = FeatureRow::new(1, 1);
        row.add_feature(0, make_feature(0, mz, rt, 100.0));
        row
    }

    #[test]
    fn test_score_in_window() {
        let scorer = RetentionTimeScorer::new(Tolerance::Da(0.001), RtTolerance::Absolute(0.1));
        let path = AlignmentPath::new(2, 0, 0, &row(100.0, 5.0));
        let candidate = row(100.0005, 5.02);
        assert!(scorer.matches(&path, &candidate));
        let score = scorer.score(&path, &candidate);
        assert!((score - 0.7).abs() < 1e-6, "{score}");
        assert!(score < DEFAULT_GAP_PENALTY);
    }

    #[test]
    fn test_score_out_of_window() {
        let scorer = RetentionTimeScorer::new(Tolerance::Da(0.001), RtTolerance::Absolute(0.1));
        let path = AlignmentPath::new(2, 0, 0, &row(100.0, 5.0));
        let far_mz = row(100.01, 5.0);
        let far_rt = row(100.0, 6.0);
        assert!(!scorer.matches(&path, &far_mz));
        assert!(!scorer.matches(&path, &far_rt));
        assert_eq!(scorer.score(&path, &far_mz), scorer.worst_score());
    }

    #[test]
    fn test_is_valid() {
        let scorer = RetentionTimeScorer::default();
        assert!(scorer.is_valid(&row(100.0, 5.0)));
        assert!(!scorer.is_valid(&FeatureRow::new(1, 2)));
    }
}
