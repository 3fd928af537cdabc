pub mod csv;
pub mod text;

use crate::signal::SampleSeries;
use anyhow::Result;
use std::path::Path;

/// Load a sample series, choosing the reader from the file extension.
///
/// `.csv`/`.tsv` files go through the delimited reader, everything else is
/// treated as a plain-text log.
pub fn read_series(path: &Path, fs: Option<f64>, value_column: Option<&str>) -> Result<SampleSeries> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some(ext @ ("csv" | "tsv")) => {
            let mut columns = self::csv::CsvColumns::default();
            if let Some(col) = value_column {
                columns.value = col.to_string();
            }
            if ext == "tsv" {
                columns.delimiter = b'\t';
            }
            self::csv::read_csv_samples(path, &columns, fs)
        }
        _ => text::read_samples(path, fs),
    }
}
