use crate::{
    filters::{band_limit, BandFilterConfig},
    metrics::{
        bpm::{estimate_bpm, BpmConfig},
        quality::{assess_peaks, Quality, QualityAssessment, QualityConfig},
    },
    preprocess::{preprocess, PreprocessConfig},
    signal::{mean, std_dev, Events, IntervalSeries, SampleSeries},
};
use serde::{Deserialize, Serialize};

/// A peak must beat this many neighbours on each side.
const NEIGHBORS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Threshold is `mean + threshold_std * std` of the filtered window.
    pub threshold_std: f64,
    /// Accepted peaks are more than this many samples apart.
    pub min_spacing: usize,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            threshold_std: 0.3,
            min_spacing: 5,
        }
    }
}

/// Configurable parameters for the windowed PPG pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpgPipelineConfig {
    /// Windows with fewer raw samples yield no BPM and a `Noisy` verdict.
    pub min_window_samples: usize,
    pub preprocess: PreprocessConfig,
    pub filter: BandFilterConfig,
    pub peaks: PeakConfig,
    pub bpm: BpmConfig,
    pub quality: QualityConfig,
}

impl Default for PpgPipelineConfig {
    fn default() -> Self {
        Self {
            min_window_samples: 100,
            preprocess: PreprocessConfig::default(),
            filter: BandFilterConfig::default(),
            peaks: PeakConfig::default(),
            bpm: BpmConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

/// Combined result of one window analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulsePipelineResult {
    /// Empirical sampling rate of the window, 0 when it cannot be derived.
    pub fs: f64,
    pub sample_count: usize,
    pub duration: f64,
    pub events: Events,
    pub intervals: IntervalSeries,
    pub bpm: Option<u16>,
    pub assessment: QualityAssessment,
}

impl PulsePipelineResult {
    pub fn quality(&self) -> Quality {
        self.assessment.quality
    }

    fn insufficient(series: &SampleSeries) -> Self {
        Self {
            fs: series.sampling_rate().unwrap_or(0.0),
            sample_count: series.len(),
            duration: series.duration(),
            events: Events::default(),
            intervals: IntervalSeries::default(),
            bpm: None,
            assessment: QualityAssessment::rejected(),
        }
    }
}

/// Locate heartbeat-like local maxima in a filtered series.
pub fn detect_peaks(data: &[f64], cfg: &PeakConfig) -> Events {
    let n = data.len();
    if n < 2 * NEIGHBORS + 1 {
        return Events::default();
    }
    let mu = mean(data);
    let threshold = mu + cfg.threshold_std * std_dev(data, mu);

    let mut peaks: Vec<usize> = Vec::new();
    for i in NEIGHBORS..n - NEIGHBORS {
        let v = data[i];
        if v <= threshold {
            continue;
        }
        let is_local_max = (1..=NEIGHBORS).all(|k| v > data[i - k] && v > data[i + k]);
        if !is_local_max {
            continue;
        }
        if let Some(&last) = peaks.last() {
            if i - last <= cfg.min_spacing {
                continue;
            }
        }
        peaks.push(i);
    }
    Events::from_indices(peaks)
}

/// Preprocess and band-limit raw values sampled at `fs`.
pub fn clean_values(values: &[f64], fs: f64, cfg: &PpgPipelineConfig) -> Vec<f64> {
    let normalized = preprocess(values, &cfg.preprocess);
    band_limit(&normalized, fs, &cfg.filter)
}

/// Cleaned copy of `series`: same timestamps, filtered values.
pub fn clean_series(series: &SampleSeries, cfg: &PpgPipelineConfig) -> SampleSeries {
    let fs = series.sampling_rate().unwrap_or(1.0);
    series.with_values(&clean_values(&series.values(), fs, cfg))
}

/// Run preprocess → band filter → peaks → BPM + quality over one window.
pub fn run_pulse_pipeline(series: &SampleSeries, cfg: &PpgPipelineConfig) -> PulsePipelineResult {
    if series.len() < cfg.min_window_samples || series.is_empty() {
        return PulsePipelineResult::insufficient(series);
    }
    let fs = series.sampling_rate().unwrap_or(0.0);
    let duration = series.duration();
    let filtered = clean_values(&series.values(), fs, cfg);
    let events = detect_peaks(&filtered, &cfg.peaks);
    let intervals = IntervalSeries::from_events(&events, fs);
    let bpm = estimate_bpm(&events, fs, &cfg.bpm);
    let assessment = assess_peaks(&events, fs, duration, &cfg.quality);
    PulsePipelineResult {
        fs,
        sample_count: series.len(),
        duration,
        events,
        intervals,
        bpm,
        assessment,
    }
}

/// BPM of a window, `None` when unavailable.
pub fn estimate_window_bpm(series: &SampleSeries, cfg: &PpgPipelineConfig) -> Option<u16> {
    run_pulse_pipeline(series, cfg).bpm
}

/// Good/Noisy verdict for a window.
pub fn assess_window_quality(series: &SampleSeries, cfg: &PpgPipelineConfig) -> Quality {
    run_pulse_pipeline(series, cfg).quality()
}
