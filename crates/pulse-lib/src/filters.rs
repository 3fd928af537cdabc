use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Band edges and smoothing for the heart-rate band filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandFilterConfig {
    /// Slowest plausible pulse (Hz), 40 BPM.
    pub min_heart_rate_hz: f64,
    /// Fastest plausible pulse (Hz), 200 BPM.
    pub max_heart_rate_hz: f64,
    /// High-pass cutoff never drops below this (Hz).
    pub lowcut_floor_hz: f64,
    /// Low-pass cutoff never exceeds this (Hz).
    pub highcut_ceiling_hz: f64,
    /// Moving-average width is `fs / smoothing_divisor`, at least 3 samples.
    pub smoothing_divisor: f64,
}

impl Default for BandFilterConfig {
    fn default() -> Self {
        Self {
            min_heart_rate_hz: 0.67,
            max_heart_rate_hz: 3.33,
            lowcut_floor_hz: 0.6,
            highcut_ceiling_hz: 4.0,
            smoothing_divisor: 12.0,
        }
    }
}

impl BandFilterConfig {
    pub fn lowcut_hz(&self) -> f64 {
        self.lowcut_floor_hz.max(self.min_heart_rate_hz * 0.9)
    }

    pub fn highcut_hz(&self) -> f64 {
        self.highcut_ceiling_hz.min(self.max_heart_rate_hz * 1.2)
    }

    pub fn smoothing_window(&self, fs: f64) -> usize {
        let divisor = self.smoothing_divisor.max(f64::EPSILON);
        ((fs / divisor).round() as usize).max(3)
    }
}

/// Shortest input the band filter will touch; shorter windows pass through.
const MIN_FILTER_LEN: usize = 5;

/// High-pass, low-pass, then a centered moving average.
///
/// `fs` is floored at 1 Hz. Inputs of four samples or fewer are returned as-is.
pub fn band_limit(data: &[f64], fs: f64, cfg: &BandFilterConfig) -> Vec<f64> {
    if data.len() < MIN_FILTER_LEN {
        return data.to_vec();
    }
    let fs = fs.max(1.0);
    let hp = highpass(data, fs, cfg.lowcut_hz());
    let lp = lowpass(&hp, fs, cfg.highcut_hz());
    centered_moving_average(&lp, cfg.smoothing_window(fs))
}

/// Single-pole high-pass starting from rest (`y[0] = 0`).
pub fn highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs.max(1.0);
    let rc = 1.0 / (2.0 * PI * cutoff.max(0.01));
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    out.push(prev_y);
    for &x in &data[1..] {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

/// Single-pole low-pass seeded with the first input (`y[0] = x[0]`).
pub fn lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs.max(1.0);
    let rc = 1.0 / (2.0 * PI * cutoff.max(0.01));
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = data[0];
    for &x in data {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}

/// Centered moving average; windows near the edges shrink to what is available.
pub fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    let n = data.len();
    let left = win / 2;
    let right = win - 1 - left;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(left);
            let end = (i + right + 1).min(n);
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}
