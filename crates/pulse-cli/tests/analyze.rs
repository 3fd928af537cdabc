mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::sample_path;
use serde_json::Value;
use std::error::Error;

#[test]
fn analyze_reports_final_record() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_72bpm.csv");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["analyze", "--input", &input]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let record: Value = serde_json::from_slice(&output)?;

    let bpm = record["bpm"].as_u64().expect("bpm");
    assert!((70..=74).contains(&bpm), "bpm {}", bpm);
    assert_eq!(record["bpm_source"], "final");
    assert_eq!(record["quality"], "good");
    assert_close(record["trimmed_at"].as_f64().expect("trim"), 4.0, 1e-9);
    assert_eq!(record["sample_count"], 180);
    assert_eq!(record["values"].as_array().expect("values").len(), 100);
    assert!(record["hrv"]["n"].as_u64().expect("hrv") >= 2);
    Ok(())
}

#[test]
fn analyze_reads_value_only_text_with_rate() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_90bpm_values.txt");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["analyze", "--input", &input, "--fs", "30"]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let record: Value = serde_json::from_slice(&output)?;
    let bpm = record["bpm"].as_u64().expect("bpm");
    assert!((88..=92).contains(&bpm), "bpm {}", bpm);
    assert_close(record["sample_rate"].as_f64().expect("rate"), 30.0, 0.5);
    Ok(())
}

#[test]
fn config_shortens_countdown() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_72bpm.csv");
    let config = sample_path("test_data/short_countdown.toml");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["analyze", "--input", &input, "--config", &config]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let record: Value = serde_json::from_slice(&output)?;
    assert_eq!(record["sample_count"], 121);
    assert_eq!(record["quality"], "good");
    Ok(())
}

#[test]
fn too_short_recording_fails() {
    let short: String = (0..30).map(|i| format!("{}\n", 120 + i % 3)).collect();
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["analyze", "--fs", "30"]).write_stdin(short);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("30 samples collected"), "stderr: {}", stderr);
}

#[test]
fn missing_rate_is_reported() {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["analyze"]).write_stdin("120\n121\n");
    cmd.assert().failure();
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}
