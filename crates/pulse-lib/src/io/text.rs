use crate::signal::{Sample, SampleSeries};
use anyhow::{bail, Context, Result};
use log::debug;
use std::path::Path;

/// Parse a plain-text sample log.
///
/// Each non-blank, non-`#` line holds either `value` or `timestamp value`
/// (comma, tab or space separated). Value-only logs need `fs` to derive a clock.
/// A leading line with no numeric field, such as a CSV header, is skipped.
pub fn parse_samples(text: &str, fs: Option<f64>) -> Result<SampleSeries> {
    let mut series = SampleSeries::new();
    let mut index = 0usize;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        if series.is_empty() && fields.iter().all(|f| f.parse::<f64>().is_err()) {
            debug!("skipping header line {}: {}", idx + 1, trimmed);
            continue;
        }
        let parse = |field: &str| {
            field
                .parse::<f64>()
                .with_context(|| format!("line {} is not numeric: {}", idx + 1, trimmed))
        };
        let sample = match fields.as_slice() {
            [value] => {
                let Some(fs) = fs.filter(|fs| *fs > 0.0) else {
                    bail!("line {} has no timestamp and no sampling rate was given", idx + 1);
                };
                Sample::new(index as f64 / fs, parse(value)?)
            }
            [timestamp, value] => Sample::new(parse(timestamp)?, parse(value)?),
            _ => bail!("line {} has {} fields, expected 1 or 2", idx + 1, fields.len()),
        };
        series.push(sample);
        index += 1;
    }
    if series.is_empty() {
        bail!("no numeric samples found");
    }
    Ok(series)
}

/// Read a plain-text sample log from disk.
pub fn read_samples(path: &Path, fs: Option<f64>) -> Result<SampleSeries> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_samples(&text, fs).with_context(|| format!("in {}", path.display()))
}
