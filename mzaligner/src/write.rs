use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use mzalign::{FeatureRow, FeatureStatus, FeatureTable};

fn write_header<W: Write>(table: &FeatureTable, writer: &mut W) -> io::Result<()> {
    write!(writer, "row_id\tmz\trt\tn_detected\tn_estimated")?;
    for sample in table.samples() {
        write!(writer, "\t{0}_height\t{0}_area", sample.name)?;
    }
    writeln!(writer)
}

fn write_row<W: Write>(row: &FeatureRow, writer: &mut W) -> io::Result<()> {
    let (n_detected, n_estimated) =
        row.features()
            .fold((0usize, 0usize), |(detected, estimated), (_, f)| match f.status {
                FeatureStatus::Detected => (detected + 1, estimated),
                FeatureStatus::Estimated => (detected, estimated + 1),
            });
    write!(
        writer,
        "{}\t{:.6}\t{:.4}\t{n_detected}\t{n_estimated}",
        row.id,
        row.average_mz(),
        row.average_rt()
    )?;
    for slot in row.slots() {
        match slot {
            Some(feature) => write!(writer, "\t{}\t{}", feature.height, feature.area)?,
            None => write!(writer, "\t\t")?,
        }
    }
    writeln!(writer)
}

/// Write `table` as tab separated text, one line per row with a height and an
/// area column for each sample. Empty cells are left blank.
pub fn write_table<W: Write>(table: &FeatureTable, writer: &mut W) -> io::Result<()> {
    write_header(table, writer)?;
    for row in table.iter() {
        write_row(row, writer)?;
    }
    Ok(())
}

/// Write `table` to `path`, or to STDOUT if `path` is `-`, compressing the
/// output if the path ends with `.gz`
pub fn write_output(table: &FeatureTable, path: &Path) -> io::Result<()> {
    if path == Path::new("-") {
        let stdout = io::stdout();
        let mut handle = io::BufWriter::new(stdout.lock());
        write_table(table, &mut handle)?;
        return handle.flush();
    }
    let handle = io::BufWriter::new(fs::File::create(path)?);
    if path.extension().is_some_and(|ext| ext == "gz") {
        debug!("Writing compressed output to {}", path.display());
        let mut encoder = GzEncoder::new(handle, Compression::best());
        write_table(table, &mut encoder)?;
        let mut handle = encoder.finish()?;
        handle.flush()
    } else {
        let mut handle = handle;
        write_table(table, &mut handle)?;
        handle.flush()
    }
}
