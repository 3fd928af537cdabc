use crate::{
    conditioner::ConditionerConfig, detectors::ppg::PpgPipelineConfig, session::SessionConfig,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Every tunable of the pulse pipeline. Omitted TOML sections and keys keep their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub conditioner: ConditionerConfig,
    pub pipeline: PpgPipelineConfig,
    pub session: SessionConfig,
}

/// Parse a TOML config. `nan` and `inf` are rejected for every key.
pub fn parse_config(text: &str) -> Result<PulseConfig> {
    let table: toml::Table = text.parse().context("parsing pulse config")?;
    if let Some(key) = non_finite_key(&table, "") {
        bail!("{key} must be a finite number");
    }
    let cfg: PulseConfig = toml::from_str(text).context("parsing pulse config")?;
    Ok(cfg)
}

fn non_finite_key(table: &toml::Table, prefix: &str) -> Option<String> {
    table.iter().find_map(|(name, value)| {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        non_finite_value(value, key)
    })
}

fn non_finite_value(value: &toml::Value, key: String) -> Option<String> {
    match value {
        toml::Value::Float(f) if !f.is_finite() => Some(key),
        toml::Value::Table(table) => non_finite_key(table, &key),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| non_finite_value(item, format!("{key}[{i}]"))),
        _ => None,
    }
}

pub fn read_config(path: &Path) -> Result<PulseConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), PulseConfig::default());
    }

    #[test]
    fn partial_sections_override_selected_keys() {
        let cfg = parse_config(
            r#"
            [conditioner]
            max_step = 10.0

            [pipeline.filter]
            min_heart_rate_hz = 0.8

            [pipeline.bpm]
            min_intervals = 3

            [session]
            measure_after_detection_s = 15.0
            "#,
        )
        .unwrap();
        let defaults = PulseConfig::default();
        assert_eq!(cfg.conditioner.max_step, 10.0);
        assert_eq!(cfg.conditioner.noise_jump, defaults.conditioner.noise_jump);
        assert_eq!(cfg.pipeline.filter.min_heart_rate_hz, 0.8);
        assert_eq!(cfg.pipeline.bpm.min_intervals, 3);
        assert_eq!(cfg.pipeline.peaks, defaults.pipeline.peaks);
        assert_eq!(cfg.session.measure_after_detection_s, 15.0);
        assert_eq!(cfg.session.refresh_interval_s, 2.0);
    }

    #[test]
    fn reads_from_disk_and_reports_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nrefresh_interval_s = 1.5").unwrap();
        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg.session.refresh_interval_s, 1.5);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[session]\nrefresh_interval_s = \"soon\"").unwrap();
        assert!(read_config(bad.path()).is_err());
        assert!(read_config(Path::new("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn non_finite_tunables_are_rejected() {
        let err = parse_config("[conditioner]\nmax_step = nan\n").unwrap_err();
        assert!(err.to_string().contains("conditioner.max_step"), "{err}");
        let err = parse_config("[pipeline.filter]\nmin_heart_rate_hz = -inf\n").unwrap_err();
        assert!(err.to_string().contains("pipeline.filter.min_heart_rate_hz"), "{err}");
        assert!(parse_config("[conditioner]\nmax_step = 1e3\n").is_ok());
    }
}
