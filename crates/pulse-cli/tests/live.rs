mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::sample_path;
use serde_json::Value;
use std::error::Error;

#[test]
fn live_replay_streams_estimates_then_record() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_72bpm.csv");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["live", "--input", &input]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let lines: Vec<Value> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    let estimates: Vec<&Value> = lines.iter().filter(|l| l["type"] == "estimate").collect();
    assert_eq!(estimates.len(), 4);
    assert!(estimates[0]["bpm"].is_null());
    assert_eq!(estimates[1]["bpm"], 72);

    let phases: Vec<&str> = lines
        .iter()
        .filter(|l| l["type"] == "phase")
        .filter_map(|l| l["phase"].as_str())
        .collect();
    assert_eq!(phases, ["detected", "complete"]);

    let record = lines.last().expect("record line");
    assert_eq!(record["type"], "record");
    assert_eq!(record["bpm"], 72);
    assert_eq!(record["quality"], "good");
    Ok(())
}

#[test]
fn live_and_offline_agree() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_90bpm_values.txt");
    let mut live = cargo_bin_cmd!("pulse");
    live.args(["live", "--input", &input, "--fs", "30"]);
    let output = live.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let mut record: Value = serde_json::from_str(text.lines().last().expect("record"))?;
    record
        .as_object_mut()
        .expect("object")
        .remove("type");

    let mut offline = cargo_bin_cmd!("pulse");
    offline.args(["analyze", "--input", &input, "--fs", "30"]);
    let output = offline.assert().success().get_output().stdout.clone();
    let expected: Value = serde_json::from_slice(&output)?;
    assert_eq!(record, expected);
    Ok(())
}
