use crate::signal::{median, Events, IntervalSeries};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmConfig {
    /// Shortest inter-peak interval kept (seconds), 200 BPM.
    pub min_interval_s: f64,
    /// Longest inter-peak interval kept (seconds), 40 BPM.
    pub max_interval_s: f64,
    /// Intervals that must survive the range filter before a rate is reported.
    pub min_intervals: usize,
    pub min_bpm: u16,
    pub max_bpm: u16,
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            min_interval_s: 0.3,
            max_interval_s: 1.5,
            min_intervals: 2,
            min_bpm: 40,
            max_bpm: 200,
        }
    }
}

/// Physiologically plausible inter-peak intervals.
pub fn valid_intervals(events: &Events, fs: f64, cfg: &BpmConfig) -> IntervalSeries {
    IntervalSeries::from_events(events, fs).within(cfg.min_interval_s, cfg.max_interval_s)
}

/// Median-interval heart rate from peak indices sampled at `fs`.
///
/// Returns `None` when too few intervals survive the range filter or the
/// resulting rate falls outside `[min_bpm, max_bpm]`.
pub fn estimate_bpm(events: &Events, fs: f64, cfg: &BpmConfig) -> Option<u16> {
    if events.len() < 2 || fs <= 0.0 {
        return None;
    }
    let valid = valid_intervals(events, fs, cfg);
    if valid.len() < cfg.min_intervals.max(1) {
        return None;
    }
    let interval = median(&valid.intervals)?;
    if interval <= 0.0 {
        return None;
    }
    let bpm = (60.0 / interval).floor();
    if bpm < f64::from(cfg.min_bpm) || bpm > f64::from(cfg.max_bpm) {
        return None;
    }
    Some(bpm as u16)
}
