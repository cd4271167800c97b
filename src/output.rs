use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::HeatplotError;
use crate::matrix::SignalMatrix;

/// Write the (possibly clustered and re-sorted) regions as BED6, one block
/// per group closed by a `#<group label>` marker line.
pub fn save_bed(matrix: &SignalMatrix, path: &Path) -> Result<(), HeatplotError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (group, label) in matrix.regions().iter().zip(matrix.group_labels()) {
        for region in group.iter() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                region.chrom, region.start, region.end, region.name, region.score, region.strand
            )?;
        }
        writeln!(writer, "#{}", label)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the underlying matrix values as TSV, one header line with the
/// sample labels followed by one row per region.
pub fn save_matrix_values(matrix: &SignalMatrix, path: &Path) -> Result<(), HeatplotError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "#{}", matrix.sample_labels().join("\t"))?;
    for row in matrix.values().rows() {
        let mut first = true;
        for v in row.iter() {
            if !first {
                write!(writer, "\t")?;
            }
            first = false;
            if v.is_nan() {
                write!(writer, "nan")?;
            } else {
                write!(writer, "{}", v)?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
