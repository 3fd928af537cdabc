use crate::signal::{Sample, SampleSeries};
use anyhow::{anyhow, Context, Result};
use ::csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::{io::Write, path::Path};

/// Column layout of a delimited sample export.
#[derive(Debug, Clone)]
pub struct CsvColumns {
    /// Timestamp column; `None` means derive the clock from `fs`.
    pub timestamp: Option<String>,
    pub value: String,
    pub delimiter: u8,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            timestamp: Some("timestamp".into()),
            value: "value".into(),
            delimiter: b',',
        }
    }
}

pub fn read_csv_samples(path: &Path, columns: &CsvColumns, fs: Option<f64>) -> Result<SampleSeries> {
    let mut reader = ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let value_idx = locate_column(&headers, &columns.value, "value")?;
    let ts_idx = columns
        .timestamp
        .as_deref()
        .and_then(|col| locate_column(&headers, col, "timestamp").ok());
    let fs = match ts_idx {
        Some(_) => 0.0,
        None => fs
            .filter(|fs| *fs > 0.0)
            .ok_or_else(|| anyhow!("no timestamp column and no sampling rate given"))?,
    };

    let mut series = SampleSeries::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading record {}", idx + 1))?;
        let value = parse_field(&record, value_idx, idx, "value")?;
        let timestamp = match ts_idx {
            Some(ts_idx) => parse_field(&record, ts_idx, idx, "timestamp")?,
            None => idx as f64 / fs,
        };
        series.push(Sample::new(timestamp, value));
    }
    if series.is_empty() {
        anyhow::bail!("{} holds no samples", path.display());
    }
    Ok(series)
}

/// Write a `timestamp,value` header and one row per sample.
pub fn write_csv_samples<W: Write>(out: W, series: &SampleSeries) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(out);
    for sample in &series.samples {
        writer.serialize(sample).context("writing sample row")?;
    }
    writer.flush().context("flushing samples")?;
    Ok(())
}

fn parse_field(record: &StringRecord, idx: usize, row: usize, hint: &str) -> Result<f64> {
    record
        .get(idx)
        .ok_or_else(|| anyhow!("row {} is missing its {}", row + 1, hint))?
        .parse::<f64>()
        .with_context(|| format!("parsing {} on row {}", hint, row + 1))
}

fn locate_column(headers: &StringRecord, requested: &str, hint: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow!("missing {} column ({})", hint, requested))
}
