//! The scan level data model that chromatogram building and gap filling read from
use std::fmt::Display;

use mzdata::prelude::*;
use mzdata::spectrum::{MultiLayerSpectrum, ScanPolarity};
use mzpeaks::{CentroidPeak, MZPeakSetType};

pub type PeakList = MZPeakSetType<CentroidPeak>;

/// A single acquisition from a raw data file, reduced to what feature
/// detection needs.
#[derive(Debug, Clone)]
pub struct Scan {
    /// The position of the scan in its source file
    pub index: usize,
    pub id: String,
    /// The scan start time, in minutes
    pub time: f64,
    pub ms_level: u8,
    pub polarity: ScanPolarity,
    pub precursor_mz: Option<f64>,
    pub tic: f32,
    /// The centroided mass list, `None` if the scan was never centroided
    pub peaks: Option<PeakList>,
}

impl Scan {
    pub fn new(
        index: usize,
        id: String,
        time: f64,
        ms_level: u8,
        polarity: ScanPolarity,
        precursor_mz: Option<f64>,
        peaks: Option<PeakList>,
    ) -> Self {
        let tic = peaks
            .as_ref()
            .map(|peaks| peaks.as_slice().iter().map(|p| p.intensity).sum())
            .unwrap_or_default();
        Self {
            index,
            id,
            time,
            ms_level,
            polarity,
            precursor_mz,
            tic,
            peaks,
        }
    }

    pub fn has_mass_list(&self) -> bool {
        self.peaks.is_some()
    }

    /// The most intense peak of the mass list within `[low, high]`
    pub fn most_intense_between(&self, low: f64, high: f64) -> Option<&CentroidPeak> {
        let peaks = self.peaks.as_ref()?.as_slice();
        let start = peaks.partition_point(|p| p.mz < low);
        peaks[start..]
            .iter()
            .take_while(|p| p.mz <= high)
            .fold(None, |best: Option<&CentroidPeak>, p| match best {
                Some(b) if b.intensity >= p.intensity => Some(b),
                _ => Some(p),
            })
    }
}

impl From<&MultiLayerSpectrum> for Scan {
    fn from(spectrum: &MultiLayerSpectrum) -> Self {
        let mut scan = Scan::new(
            spectrum.index(),
            spectrum.id().to_string(),
            spectrum.start_time(),
            spectrum.ms_level(),
            spectrum.polarity(),
            spectrum.precursor().map(|prec| prec.ion().mz),
            spectrum.peaks.clone(),
        );
        if scan.peaks.is_none() {
            scan.tic = spectrum.peaks().tic();
        }
        scan
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleId(pub usize);

impl Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sample:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleInfo {
    pub id: SampleId,
    pub name: String,
}

impl SampleInfo {
    pub fn new(id: SampleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Display for SampleInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which scans of a sample participate in chromatogram building and gap filling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSelection {
    pub ms_level: Option<u8>,
    /// An inclusive retention time range, in minutes
    pub time_range: Option<(f64, f64)>,
    pub polarity: Option<ScanPolarity>,
}

impl Default for ScanSelection {
    fn default() -> Self {
        Self {
            ms_level: Some(1),
            time_range: None,
            polarity: None,
        }
    }
}

impl ScanSelection {
    pub fn new(
        ms_level: Option<u8>,
        time_range: Option<(f64, f64)>,
        polarity: Option<ScanPolarity>,
    ) -> Self {
        Self {
            ms_level,
            time_range,
            polarity,
        }
    }

    pub fn any() -> Self {
        Self::new(None, None, None)
    }

    pub fn with_time_range(mut self, start: f64, end: f64) -> Self {
        self.time_range = Some((start, end));
        self
    }

    pub fn with_polarity(mut self, polarity: ScanPolarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn matches(&self, scan: &Scan) -> bool {
        if let Some(level) = self.ms_level {
            if scan.ms_level != level {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if scan.time < start || scan.time > end {
                return false;
            }
        }
        if let Some(polarity) = self.polarity {
            if scan.polarity != polarity {
                return false;
            }
        }
        true
    }
}

/// All the scans of one sample in acquisition order
#[derive(Debug, Clone)]
pub struct RawSample {
    pub info: SampleInfo,
    pub scans: Vec<Scan>,
}

impl RawSample {
    pub fn new(info: SampleInfo, scans: Vec<Scan>) -> Self {
        Self { info, scans }
    }

    pub fn id(&self) -> SampleId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// The scans accepted by `selection`, in file order
    pub fn select(&self, selection: &ScanSelection) -> Vec<&Scan> {
        self.scans.iter().filter(|s| selection.matches(s)).collect()
    }

    /// The indices of fragmentation scans whose precursor falls in `mz_range`
    /// and which were acquired within `rt_range`, most intense first.
    pub fn fragment_scans(&self, mz_range: (f64, f64), rt_range: (f64, f64)) -> Vec<usize> {
        let mut hits: Vec<&Scan> = self
            .scans
            .iter()
            .filter(|s| {
                s.ms_level > 1
                    && s.time >= rt_range.0
                    && s.time <= rt_range.1
                    && s.precursor_mz
                        .is_some_and(|mz| mz >= mz_range.0 && mz <= mz_range.1)
            })
            .collect();
        hits.sort_by(|a, b| b.tic.total_cmp(&a.tic).then(a.index.cmp(&b.index)));
        hits.into_iter().map(|s| s.index).collect()
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    use super::*;

    pub fn make_scan(index: usize, time: f64, peaks: &[(f64, f32)]) -> Scan {
        let peaks: PeakList = peaks
            .iter()
            .map(|(mz, intensity)| CentroidPeak::new(*mz, *intensity, 0))
            .collect();
        Scan::new(
            index,
            format!("scan={}", index + 1),
            time,
            1,
            ScanPolarity::Positive,
            None,
            Some(peaks),
        )
    }

    pub fn make_fragment(index: usize, time: f64, precursor_mz: f64, tic: f32) -> Scan {
        let peaks: PeakList = [CentroidPeak::new(precursor_mz / 2.0, tic, 0)]
            .into_iter()
            .collect();
        Scan::new(
            index,
            format!("scan={}", index + 1),
            time,
            2,
            ScanPolarity::Positive,
            Some(precursor_mz),
            Some(peaks),
        )
    }

    /// A sample with one scan per `time` step, each carrying the peaks
    /// produced by `f` for that scan position.
    pub fn make_sample<F: Fn(usize) -> Vec<(f64, f32)>>(
        id: usize,
        n_scans: usize,
        f: F,
    ) -> RawSample {
        let scans = (0..n_scans)
            .map(|i| make_scan(i, i as f64 * 0.05, &f(i)))
            .collect();
        RawSample::new(SampleInfo::new(SampleId(id), format!("sample-{id}")), scans)
    }
}

#[cfg(test)]
mod test {
    use super::test_data::*;
    use super::*;

    #[test]
    fn test_selection() {
        let mut scans = vec![
            make_scan(0, 1.0, &[(100.0, 10.0)]),
            make_fragment(1, 1.01, 100.0, 50.0),
            make_scan(2, 2.0, &[(100.0, 10.0)]),
        ];
        scans[2].polarity = ScanPolarity::Negative;
        let sample = RawSample::new(SampleInfo::new(SampleId(0), "a"), scans);

        assert_eq!(sample.select(&ScanSelection::default()).len(), 2);
        assert_eq!(sample.select(&ScanSelection::any()).len(), 3);
        let sel = ScanSelection::default().with_polarity(ScanPolarity::Positive);
        assert_eq!(sample.select(&sel).len(), 1);
        let sel = ScanSelection::any().with_time_range(1.005, 3.0);
        let hits: Vec<_> = sample.select(&sel).iter().map(|s| s.index).collect();
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn test_most_intense_between() {
        let scan = make_scan(0, 1.0, &[(99.0, 5.0), (100.0, 20.0), (100.01, 30.0), (101.0, 80.0)]);
        let peak = scan.most_intense_between(99.5, 100.5).unwrap();
        assert_eq!(peak.intensity, 30.0);
        assert!(scan.most_intense_between(102.0, 103.0).is_none());
        assert_eq!(scan.tic, 135.0);
    }

    #[test]
    fn test_fragment_scans_by_tic() {
        let scans = vec![
            make_scan(0, 1.0, &[(100.0, 10.0)]),
            make_fragment(1, 1.01, 100.002, 50.0),
            make_fragment(2, 1.02, 100.001, 500.0),
            make_fragment(3, 1.03, 250.0, 900.0),
            make_fragment(4, 4.0, 100.0, 900.0),
        ];
        let sample = RawSample::new(SampleInfo::new(SampleId(0), "a"), scans);
        let hits = sample.fragment_scans((99.99, 100.01), (0.9, 1.5));
        assert_eq!(hits, vec![2, 1]);
    }
}
