use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use mzdata::io::MassSpectrometryFormat;

use mzalign::{
    run_pipeline, AlignmentParams, CancellationToken, ChromatogramParams, GapFillParams,
    PipelineError, PipelineParams, RawSample, RetentionTimeScorer, ScanSelection, ScoreType,
    TaskOutcome, Tolerance, DEFAULT_GAP_PENALTY,
};

use crate::args::{ArgPolarity, ArgRtTolerance, ArgTolerance};
use crate::load::SampleLoader;
use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;
use crate::write::write_output;

fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

fn positive_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("`{s}` is not a positive number"))
    }
}

#[derive(Debug, Error)]
pub enum MZAlignerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read {path}: {source}")]
    InputError {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("Failed to pick peaks in {0}: {1}")]
    PeakPickingError(String, String),
    #[error(transparent)]
    PipelineError(#[from] PipelineError),
    #[error("Processing was cancelled before it completed")]
    Cancelled,
    #[error("No input files were provided")]
    NoInputFiles,
    #[error("Failed to create the thread pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to read the configuration: {0}")]
    ConfigurationError(#[from] figment::Error),
    #[error("Failed to configure logging: {0}")]
    LoggingError(String),
}

/// Build extracted ion chromatograms from LC-MS files, align them across
/// samples, and fill the gaps left by alignment.
///
/// Read one or more mzML or MGF files, then write a tab separated feature
/// table with one row per aligned feature and a height and area column per
/// sample.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZAligner {
    /// The paths to read the input spectra from, one sample per file
    #[arg(required = true, num_args = 1..)]
    pub input_files: Vec<PathBuf>,

    /// The path to write the feature table to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzaligner.toml` in the working directory.
    /// Environment variables prefixed with `MZALIGNER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The time range to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process in minutes, denoted (start?)-(stop?)

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// The MS level of the scans to build chromatograms from
    #[arg(long = "ms-level", default_value_t = 1)]
    pub ms_level: u8,

    /// The scan polarity to build chromatograms from
    #[arg(long = "polarity", value_enum, default_value_t = ArgPolarity::Any)]
    pub polarity: ArgPolarity,

    /// The m/z tolerance for chromatogram intervals, alignment and gap filling, e.g. 10ppm or 0.005da
    #[arg(
        short = 'm',
        long = "mz-tolerance",
        default_value = "10ppm",
        value_parser = ArgTolerance::from_str
    )]
    pub mz_tolerance: ArgTolerance,

    /// The retention time tolerance for alignment, in minutes or as a percentage, e.g. 0.1 or 2%
    #[arg(
        long = "rt-tolerance",
        default_value = "0.1",
        value_parser = ArgRtTolerance::from_str
    )]
    pub rt_tolerance: ArgRtTolerance,

    /// The minimum intensity a data point needs to start a new chromatogram
    #[arg(long = "min-start-intensity", default_value_t = 1000.0, value_parser = non_negative_float_f32)]
    pub min_start_intensity: f32,

    /// The intensity a data point must exceed to count towards a consecutive run
    #[arg(long = "min-consecutive-intensity", default_value_t = 500.0, value_parser = non_negative_float_f32)]
    pub min_consecutive_intensity: f32,

    /// The minimum number of consecutive scans a chromatogram must span
    #[arg(long = "min-consecutive-scans", default_value_t = 5)]
    pub min_consecutive_scans: usize,

    /// The minimum number of data points a chromatogram must hold
    #[arg(long = "min-total-points", default_value_t = 5)]
    pub min_total_points: usize,

    /// Do not pad chromatograms with zero intensity points at either end
    #[arg(long = "no-edge-zeros")]
    pub no_edge_zeros: bool,

    /// The score an alignment path accrues for each sample it leaves empty
    #[arg(long = "gap-penalty", default_value_t = DEFAULT_GAP_PENALTY, value_parser = positive_float_f64)]
    pub gap_penalty: ScoreType,

    /// Do not fill alignment gaps from the raw scans
    #[arg(long = "no-gap-filling")]
    pub no_gap_filling: bool,

    /// Pick peaks in profile scans with this minimum signal to noise ratio.
    ///
    /// Without this, profile scans are not centroided and cannot be used.
    #[arg(long = "pick-peaks", value_name = "SNR", value_parser = non_negative_float_f32)]
    pub pick_peaks: Option<f32>,
}

impl Default for MZAligner {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_file: PathBuf::from("-"),
            log_file: None,
            config_file: None,
            threads: -1,
            time_range: None,
            ms_level: 1,
            polarity: ArgPolarity::Any,
            mz_tolerance: ArgTolerance::default(),
            rt_tolerance: ArgRtTolerance::default(),
            min_start_intensity: 1000.0,
            min_consecutive_intensity: 500.0,
            min_consecutive_scans: 5,
            min_total_points: 5,
            no_edge_zeros: false,
            gap_penalty: DEFAULT_GAP_PENALTY,
            no_gap_filling: false,
            pick_peaks: None,
        }
    }
}

impl MZAligner {
    /// Layer `mzaligner.toml`, the `--config-file` and `MZALIGNER_` environment
    /// variables over the parsed arguments. Later sources take precedence.
    pub fn configure(self) -> Result<Self, MZAlignerError> {
        let mut config = Figment::new()
            .merge(Serialized::defaults(&self))
            .merge(Toml::file("mzaligner.toml"));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        let config = config.merge(Env::prefixed("MZALIGNER_"));
        Ok(config.extract()?)
    }

    fn num_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZAlignerError> {
        let num_threads = self.num_threads();
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    pub fn selection(&self) -> ScanSelection {
        let selection = ScanSelection::new(Some(self.ms_level), None, self.polarity.into());
        match self.time_range {
            Some(range) => selection.with_time_range(range.start, range.end),
            None => selection,
        }
    }

    pub fn pipeline_params(&self) -> PipelineParams {
        let selection = self.selection();
        let mz_tolerance: Tolerance = self.mz_tolerance.into();
        PipelineParams {
            selection,
            chromatogram: ChromatogramParams::new(
                mz_tolerance,
                self.min_start_intensity,
                self.min_consecutive_intensity,
                self.min_consecutive_scans,
                self.min_total_points,
                !self.no_edge_zeros,
            ),
            alignment: AlignmentParams::new(self.gap_penalty, Some(self.num_threads())),
            scorer: RetentionTimeScorer::new(mz_tolerance, self.rt_tolerance.into()),
            gap_fill: (!self.no_gap_filling).then(|| GapFillParams::new(mz_tolerance, selection)),
        }
    }

    pub fn main(&self) -> Result<(), MZAlignerError> {
        info!(
            "mzaligner v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        if self.input_files.is_empty() {
            return Err(MZAlignerError::NoInputFiles);
        }
        for path in self.input_files.iter() {
            info!("Input: {}", path.display());
        }
        info!("Output: {}", self.output_file.display());
        self.create_threadpool()?.install(|| self.run_workflow())
    }

    fn load_samples(&self) -> Result<(Vec<RawSample>, ProgressRecord), MZAlignerError> {
        let loader = SampleLoader::new(Some(self.ms_level), self.pick_peaks, self.time_range);
        let loaded: Vec<(RawSample, ProgressRecord)> = self
            .input_files
            .par_iter()
            .enumerate()
            .map(|(i, path)| loader.load(i, path))
            .collect::<Result<_, _>>()?;
        let (samples, progress): (Vec<RawSample>, Vec<ProgressRecord>) =
            loaded.into_iter().unzip();
        let prog = progress
            .into_iter()
            .fold(ProgressRecord::default(), ProgressRecord::sum);
        Ok((samples, prog))
    }

    fn run_workflow(&self) -> Result<(), MZAlignerError> {
        let start = Instant::now();
        let (samples, mut prog) = self.load_samples()?;
        let read_done = Instant::now();
        info!(
            "Loaded {} samples in {:0.3?}",
            samples.len(),
            read_done - start
        );

        let params = self.pipeline_params();
        let output = match run_pipeline(&samples, &params, &CancellationToken::new())? {
            TaskOutcome::Completed(output) => output,
            TaskOutcome::Cancelled => return Err(MZAlignerError::Cancelled),
        };
        for set in output.chromatograms.iter() {
            prog += ProgressRecord::from_chromatograms(set);
        }
        prog += ProgressRecord::from_aligned(&output.table);

        info!("Samples: {}", prog.samples);
        info!("MS1 Scans: {} | MSn Scans: {}", prog.ms1_scans, prog.msn_scans);
        if prog.profile_scans_picked > 0 {
            info!("Profile Scans Picked: {}", prog.profile_scans_picked);
        }
        info!(
            "Chromatograms: {} kept of {} opened from {} data points",
            prog.chromatograms_kept, prog.chromatograms_opened, prog.data_points
        );
        info!(
            "Aligned Rows: {} | Detected Features: {} | Estimated Features: {}",
            prog.aligned_rows, prog.detected_features, prog.estimated_features
        );

        write_output(&output.table, &self.output_file)?;
        info!("Total Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mzalign::RtTolerance;

    #[test]
    fn test_parse_args() {
        let args = MZAligner::parse_from([
            "mzaligner",
            "a.mzML",
            "b.mzML.gz",
            "-t",
            "2",
            "-r",
            "5-20",
            "--mz-tolerance",
            "0.01da",
            "--rt-tolerance",
            "1%",
            "--no-gap-filling",
        ]);
        assert_eq!(args.input_files.len(), 2);
        assert_eq!(args.output_file, PathBuf::from("-"));
        assert_eq!(args.num_threads(), 2);
        assert_eq!(args.time_range, Some(TimeRange::new(5.0, 20.0)));

        let params = args.pipeline_params();
        assert!(params.gap_fill.is_none());
        assert!(matches!(params.scorer.mz_tolerance, Tolerance::Da(v) if v == 0.01));
        assert_eq!(params.scorer.rt_tolerance, RtTolerance::Relative(0.01));
        assert_eq!(params.selection.time_range, Some((5.0, 20.0)));
        assert_eq!(params.selection.ms_level, Some(1));
        assert_eq!(params.alignment.threads, Some(2));
        assert!(params.chromatogram.add_edge_zeros);
    }

    #[test]
    fn test_defaults_match_parser() {
        let parsed = MZAligner::parse_from(["mzaligner", "a.mzML"]);
        let defaults = MZAligner {
            input_files: vec![PathBuf::from("a.mzML")],
            ..Default::default()
        };
        assert_eq!(
            toml::to_string(&parsed).unwrap(),
            toml::to_string(&defaults).unwrap()
        );
    }
}
