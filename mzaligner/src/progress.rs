use std::ops::{Add, AddAssign};

use mzalign::{ChromatogramSet, FeatureStatus, FeatureTable};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub samples: usize,
    pub ms1_scans: usize,
    pub msn_scans: usize,
    pub profile_scans_picked: usize,
    pub data_points: usize,
    pub chromatograms_opened: usize,
    pub chromatograms_kept: usize,
    pub aligned_rows: usize,
    pub detected_features: usize,
    pub estimated_features: usize,
}

impl ProgressRecord {
    pub fn from_chromatograms(set: &ChromatogramSet) -> Self {
        Self {
            data_points: set.n_points,
            chromatograms_opened: set.n_opened,
            chromatograms_kept: set.table.len(),
            ..Default::default()
        }
    }

    pub fn from_aligned(table: &FeatureTable) -> Self {
        let mut prog = Self {
            aligned_rows: table.len(),
            ..Default::default()
        };
        for (_, feature) in table.iter().flat_map(|row| row.features()) {
            match feature.status {
                FeatureStatus::Detected => prog.detected_features += 1,
                FeatureStatus::Estimated => prog.estimated_features += 1,
            }
        }
        prog
    }

    pub fn sum(self, other: Self) -> Self {
        self + other
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.samples += rhs.samples;
        self.ms1_scans += rhs.ms1_scans;
        self.msn_scans += rhs.msn_scans;
        self.profile_scans_picked += rhs.profile_scans_picked;
        self.data_points += rhs.data_points;
        self.chromatograms_opened += rhs.chromatograms_opened;
        self.chromatograms_kept += rhs.chromatograms_kept;
        self.aligned_rows += rhs.aligned_rows;
        self.detected_features += rhs.detected_features;
        self.estimated_features += rhs.estimated_features;
    }
}
