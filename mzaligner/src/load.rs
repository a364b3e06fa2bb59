use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

#[cfg(feature = "mzmlb")]
use mzdata::io::mzmlb::MzMLbReaderType;
#[cfg(feature = "thermo")]
use mzdata::io::thermo::ThermoRawReaderType;
use mzdata::io::{
    infer_format, mgf::MGFReaderType, mzml::MzMLReaderType, MassSpectrometryFormat,
    RestartableGzDecoder, StreamingSpectrumIterator,
};
use mzdata::prelude::*;
use mzdata::spectrum::{MultiLayerSpectrum, SignalContinuity};
use mzpeaks::{CentroidPeak, DeconvolutedPeak};
use tracing::{debug, info, instrument, warn};

use mzalign::{RawSample, SampleId, SampleInfo, Scan};

use crate::driver::MZAlignerError;
use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;

pub(crate) type CPeak = CentroidPeak;
pub(crate) type DPeak = DeconvolutedPeak;
pub(crate) type SpectrumType = MultiLayerSpectrum<CPeak, DPeak>;

/// The sample name of a data file, its file name without any data or
/// compression extensions
pub(crate) fn sample_name(path: &Path) -> String {
    let mut stem = path.file_stem().unwrap_or(path.as_os_str());
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz")) {
        stem = Path::new(stem).file_stem().unwrap_or(stem);
    }
    stem.to_string_lossy().to_string()
}

/// Reads a data file into a [`RawSample`], centroiding the scans that
/// chromatogram building and gap filling will read
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SampleLoader {
    /// Only scans of this MS level keep their mass lists
    pub ms_level: Option<u8>,
    /// Pick peaks in profile scans with this signal to noise threshold
    pub pick_peaks: Option<f32>,
    pub time_range: Option<TimeRange>,
}

impl SampleLoader {
    pub(crate) fn new(
        ms_level: Option<u8>,
        pick_peaks: Option<f32>,
        time_range: Option<TimeRange>,
    ) -> Self {
        Self {
            ms_level,
            pick_peaks,
            time_range,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub(crate) fn load(
        &self,
        index: usize,
        path: &Path,
    ) -> Result<(RawSample, ProgressRecord), MZAlignerError> {
        let started = Instant::now();
        let input_error = |source: io::Error| MZAlignerError::InputError {
            path: path.display().to_string(),
            source,
        };
        let (ms_format, compressed) = infer_format(path).map_err(input_error)?;
        debug!("Detected {ms_format:?} from path (compressed? {compressed})");

        let name = sample_name(path);
        let (scans, mut prog) = match ms_format {
            MassSpectrometryFormat::MGF => {
                if compressed {
                    let fh = RestartableGzDecoder::new(io::BufReader::new(
                        fs::File::open(path).map_err(input_error)?,
                    ));
                    let reader = StreamingSpectrumIterator::new(
                        MGFReaderType::<_, CPeak, DPeak>::new(fh),
                    );
                    self.read_scans(reader)?
                } else {
                    let reader = MGFReaderType::<_, CPeak, DPeak>::open_path(path.to_path_buf())
                        .map_err(input_error)?;
                    self.read_scans(reader)?
                }
            }
            MassSpectrometryFormat::MzML => {
                if compressed {
                    let fh = RestartableGzDecoder::new(io::BufReader::new(
                        fs::File::open(path).map_err(input_error)?,
                    ));
                    let reader = StreamingSpectrumIterator::new(
                        MzMLReaderType::<_, CPeak, DPeak>::new(fh),
                    );
                    self.read_scans(reader)?
                } else {
                    let reader = MzMLReaderType::<_, CPeak, DPeak>::open_path(path.to_path_buf())
                        .map_err(input_error)?;
                    self.read_scans(reader)?
                }
            }
            #[cfg(feature = "mzmlb")]
            MassSpectrometryFormat::MzMLb => {
                let reader = MzMLbReaderType::<CPeak, DPeak>::open_path(path.to_path_buf())
                    .map_err(input_error)?;
                self.read_scans(reader)?
            }
            #[cfg(feature = "thermo")]
            MassSpectrometryFormat::ThermoRaw => {
                let reader = ThermoRawReaderType::<CPeak, DPeak>::open_path(path.to_path_buf())
                    .map_err(input_error)?;
                self.read_scans(reader)?
            }
            _ => {
                return Err(MZAlignerError::FormatUnknownOrNotSupportedError(
                    path.display().to_string(),
                    ms_format,
                ))
            }
        };
        prog.samples = 1;
        info!(
            "Read {} MS1 and {} MSn scans from {name} in {:0.3?}",
            prog.ms1_scans,
            prog.msn_scans,
            started.elapsed()
        );
        let info = SampleInfo::new(SampleId(index), name);
        Ok((RawSample::new(info, scans), prog))
    }

    fn read_scans<I: Iterator<Item = SpectrumType>>(
        &self,
        reader: I,
    ) -> Result<(Vec<Scan>, ProgressRecord), MZAlignerError> {
        let mut prog = ProgressRecord::default();
        let mut scans = Vec::new();
        let mut n_profile_skipped = 0usize;
        for spectrum in reader {
            if let Some(range) = self.time_range {
                if !range.contains(spectrum.start_time()) {
                    continue;
                }
            }
            if spectrum.ms_level() > 1 {
                prog.msn_scans += 1;
            } else {
                prog.ms1_scans += 1;
            }
            let scan = self.convert(spectrum, &mut prog, &mut n_profile_skipped)?;
            scans.push(scan);
        }
        if n_profile_skipped > 0 {
            warn!(
                "{n_profile_skipped} profile scans were not centroided, pass a peak picking threshold to use them"
            );
        }
        Ok((scans, prog))
    }

    fn convert(
        &self,
        mut spectrum: SpectrumType,
        prog: &mut ProgressRecord,
        n_profile_skipped: &mut usize,
    ) -> Result<Scan, MZAlignerError> {
        let wants_peaks = self
            .ms_level
            .map_or(true, |level| spectrum.ms_level() == level);
        if wants_peaks && spectrum.peaks.is_none() {
            match spectrum.signal_continuity() {
                SignalContinuity::Profile => match self.pick_peaks {
                    Some(snr) => {
                        spectrum
                            .pick_peaks(snr)
                            .map_err(|e| {
                                MZAlignerError::PeakPickingError(
                                    spectrum.id().to_string(),
                                    e.to_string(),
                                )
                            })?;
                        spectrum.description_mut().signal_continuity = SignalContinuity::Centroid;
                        prog.profile_scans_picked += 1;
                    }
                    None => *n_profile_skipped += 1,
                },
                _ => {
                    let failure = spectrum.try_build_centroids().err().map(|e| e.to_string());
                    if let Some(e) = failure {
                        debug!("Failed to read centroids of {}: {e}", spectrum.id());
                    }
                }
            }
        }
        let mut scan = Scan::from(&spectrum);
        if !wants_peaks {
            scan.peaks = None;
        }
        Ok(scan)
    }
}
