use crate::signal::{mean, median, std_dev, SampleSeries};
use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as a flat signal.
const FLAT_STD: f64 = 1e-4;
/// Floor applied to the soft-clip spread so the cap never collapses to zero.
const MIN_CLIP_STD: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Median filter width, forced odd and at least 3.
    pub median_window: usize,
    /// Soft-clip ceiling in standard deviations from the mean.
    pub clip_std: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            median_window: 5,
            clip_std: 3.5,
        }
    }
}

/// Run the full preprocessing chain over raw values: linear detrend, median
/// despike, tanh soft clip and z-score normalization, in that order.
pub fn preprocess(data: &[f64], cfg: &PreprocessConfig) -> Vec<f64> {
    let detrended = detrend(data);
    let despiked = median_despike(&detrended, cfg.median_window);
    let clipped = soft_clip(&despiked, cfg.clip_std);
    normalize(&clipped)
}

/// Preprocess a series' values while keeping its timestamps.
pub fn preprocess_series(series: &SampleSeries, cfg: &PreprocessConfig) -> SampleSeries {
    series.with_values(&preprocess(&series.values(), cfg))
}

/// Subtract the least-squares line fitted over the sample index.
pub fn detrend(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = mean(data);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, &y) in data.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }
    if sxx == 0.0 {
        return data.to_vec();
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    data.iter()
        .enumerate()
        .map(|(i, &y)| y - (slope * i as f64 + intercept))
        .collect()
}

/// Sliding median; edge windows shrink to the available samples.
pub fn median_despike(data: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(3) | 1;
    let n = data.len();
    if n <= window {
        return data.to_vec();
    }
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            median(&data[start..end]).unwrap_or(data[i])
        })
        .collect()
}

/// Smoothly limit excursions to `clip_std` standard deviations with `tanh`.
pub fn soft_clip(data: &[f64], clip_std: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mu = mean(data);
    let sd = std_dev(data, mu).max(MIN_CLIP_STD);
    let cap = clip_std.abs().max(f64::EPSILON) * sd;
    data.iter()
        .map(|&x| mu + cap * ((x - mu) / cap).tanh())
        .collect()
}

/// Zero mean, unit variance; flat input becomes all zeros.
pub fn normalize(data: &[f64]) -> Vec<f64> {
    let mu = mean(data);
    let sd = std_dev(data, mu);
    if sd < FLAT_STD {
        return vec![0.0; data.len()];
    }
    data.iter().map(|&x| (x - mu) / sd).collect()
}
