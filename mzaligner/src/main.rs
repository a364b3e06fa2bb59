use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzaligner::{MZAligner, MZAlignerError};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn default_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
}

/// Log to STDERR and, if given, to `log_file`. The returned guard must be
/// held until the program exits so buffered file output is flushed.
fn configure_log(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, MZAlignerError> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(default_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .with_filter(default_filter()),
        )
        .with(file_layer);

    tracing_log::LogTracer::init().map_err(|e| MZAlignerError::LoggingError(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| MZAlignerError::LoggingError(e.to_string()))?;
    Ok(guard)
}

fn main() -> Result<(), MZAlignerError> {
    let args = MZAligner::parse().configure()?;
    let _guard = configure_log(args.log_file.as_deref())?;
    if let Err(e) = args.main() {
        error!("{e}");
        return Err(e);
    }
    Ok(())
}
