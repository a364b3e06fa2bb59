//! Feature rows and the tables that hold them
use crate::feature::Feature;
use crate::scan::{SampleId, SampleInfo};

/// One row of a feature table, holding at most one feature per sample.
///
/// The average m/z and retention time are running means updated as each
/// detected feature is added. They are never recomputed from the slots, so
/// the order features are added in matters for the exact floating point value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureRow {
    pub id: usize,
    slots: Vec<Option<Feature>>,
    mz_sum: f64,
    rt_sum: f64,
    count: usize,
    average_mz: f64,
    average_rt: f64,
}

impl FeatureRow {
    pub fn new(id: usize, n_samples: usize) -> Self {
        Self {
            id,
            slots: vec![None; n_samples],
            mz_sum: 0.0,
            rt_sum: 0.0,
            count: 0,
            average_mz: 0.0,
            average_rt: 0.0,
        }
    }

    /// Place `feature` in `slot` and fold it into the running means.
    ///
    /// Replacing an occupied slot first removes the previous feature's
    /// contribution.
    pub fn add_feature(&mut self, slot: usize, feature: Feature) {
        if let Some(prev) = self.slots[slot].take() {
            self.mz_sum -= prev.mz;
            self.rt_sum -= prev.rt;
            self.count -= 1;
        }
        self.mz_sum += feature.mz;
        self.rt_sum += feature.rt;
        self.count += 1;
        self.average_mz = self.mz_sum / self.count as f64;
        self.average_rt = self.rt_sum / self.count as f64;
        self.slots[slot] = Some(feature);
    }

    /// Place an estimated `feature` in an empty `slot` without touching the
    /// row's running means.
    pub fn fill_gap(&mut self, slot: usize, feature: Feature) {
        if self.slots[slot].is_none() {
            self.slots[slot] = Some(feature);
        }
    }

    pub fn feature(&self, slot: usize) -> Option<&Feature> {
        self.slots.get(slot).and_then(|f| f.as_ref())
    }

    pub fn slots(&self) -> &[Option<Feature>] {
        &self.slots
    }

    /// Iterate over the occupied slots
    pub fn features(&self) -> impl Iterator<Item = (usize, &Feature)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
    }

    pub fn gaps(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, f)| if f.is_none() { Some(i) } else { None })
    }

    pub fn has_gaps(&self) -> bool {
        self.slots.iter().any(|f| f.is_none())
    }

    pub fn n_samples(&self) -> usize {
        self.slots.len()
    }

    /// The number of features folded into the running means
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn average_mz(&self) -> f64 {
        self.average_mz
    }

    pub fn average_rt(&self) -> f64 {
        self.average_rt
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|f| f.is_none())
    }
}

/// A set of feature rows over an ordered list of samples
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureTable {
    pub name: String,
    samples: Vec<SampleInfo>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, samples: Vec<SampleInfo>) -> Self {
        Self {
            name: name.into(),
            samples,
            rows: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    pub fn sample_slot(&self, sample: SampleId) -> Option<usize> {
        self.samples.iter().position(|s| s.id == sample)
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    /// A fresh empty row sized for this table, with the next sequential ID
    pub fn new_row(&self) -> FeatureRow {
        FeatureRow::new(self.rows.len() + 1, self.samples.len())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Order rows by ascending average m/z, then retention time
    pub fn sort_by_mz(&mut self) {
        self.rows.sort_by(|a, b| {
            a.average_mz
                .total_cmp(&b.average_mz)
                .then(a.average_rt.total_cmp(&b.average_rt))
        });
    }

    /// Assign sequential row IDs starting at 1 in the current row order
    pub fn renumber(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.id = i + 1;
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureRow> {
        self.rows.iter()
    }

    pub(crate) fn with_rows(name: String, samples: Vec<SampleInfo>, rows: Vec<FeatureRow>) -> Self {
        Self {
            name,
            samples,
            rows,
        }
    }
}


#[cfg(test)]
mod test {
    use super::test_data::*;
    use super::*;

    #[test]
    fn test_running_means() {
        let mut row = FeatureRow::new(1, 3);
        row.add_feature(0, make_feature(0, 100.0, 5.0, 10.0));
        row.add_feature(2, make_feature(2, 100.002, 5.2, 10.0));
        assert_eq!(row.count(), 2);
        assert!((row.average_mz() - 100.001).abs() < 1e-9);
        assert!((row.average_rt() - 5.1).abs() < 1e-9);
        assert_eq!(row.gaps().collect::<Vec<_>>(), vec![1]);

        row.fill_gap(1, make_feature(1, 200.0, 9.0, 1.0));
        assert_eq!(row.count(), 2);
        assert!((row.average_mz() - 100.001).abs() < 1e-9);
        assert!(!row.has_gaps());
    }

    #[test]
    fn test_replace_feature() {
        let mut row = FeatureRow::new(1, 1);
        row.add_feature(0, make_feature(0, 100.0, 5.0, 10.0));
        row.add_feature(0, make_feature(0, 101.0, 6.0, 10.0));
        assert_eq!(row.count(), 1);
        assert!((row.average_mz() - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_sort_and_renumber() {
        let mut table = make_table(0, &[(300.0, 1.0), (100.0, 2.0), (100.0, 1.0)]);
        table.sort_by_mz();
        table.renumber();
        let keys: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.average_mz(), r.average_rt()))
            .collect();
        assert_eq!(keys, vec![(1, 100.0, 1.0), (2, 100.0, 2.0), (3, 300.0, 1.0)]);
        assert_eq!(table.sample_slot(SampleId(0)), Some(0));
        assert_eq!(table.sample_slot(SampleId(4)), None);
    }
}
