use crate::signal::{mean, std_dev, Events, IntervalSeries};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal-quality verdict for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Good,
    Noisy,
}

impl Quality {
    pub fn is_good(self) -> bool {
        matches!(self, Quality::Good)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => f.write_str("good"),
            Quality::Noisy => f.write_str("noisy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Fewest plausible beats per second of window.
    pub min_beats_per_s: f64,
    /// Most plausible beats per second of window.
    pub max_beats_per_s: f64,
    pub min_intervals: usize,
    /// Interval coefficient of variation must stay below this.
    pub max_interval_cv: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_beats_per_s: 0.5,
            max_beats_per_s: 3.5,
            min_intervals: 3,
            max_interval_cv: 0.25,
        }
    }
}

/// Outcome of the peak plausibility and regularity checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub peak_count: usize,
    /// Accepted peak-count range `[min, max]` for the window duration.
    pub expected_peaks: [f64; 2],
    pub interval_cv: Option<f64>,
    pub quality: Quality,
}

impl QualityAssessment {
    /// Verdict for windows too short to analyze.
    pub fn rejected() -> Self {
        Self {
            peak_count: 0,
            expected_peaks: [0.0, 0.0],
            interval_cv: None,
            quality: Quality::Noisy,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.quality.is_good()
    }
}

/// Standard deviation over mean of the intervals; 0 for empty or zero-mean input.
pub fn interval_cv(rr: &IntervalSeries) -> f64 {
    if rr.is_empty() {
        return 0.0;
    }
    let mu = mean(&rr.intervals);
    if mu == 0.0 {
        return 0.0;
    }
    std_dev(&rr.intervals, mu) / mu
}

/// Classify a window from its detected peaks.
///
/// `duration` is the window's last-minus-first timestamp.
pub fn assess_peaks(
    events: &Events,
    fs: f64,
    duration: f64,
    cfg: &QualityConfig,
) -> QualityAssessment {
    let peak_count = events.len();
    let expected_peaks = [
        cfg.min_beats_per_s * duration,
        cfg.max_beats_per_s * duration,
    ];
    let mut assessment = QualityAssessment {
        peak_count,
        expected_peaks,
        interval_cv: None,
        quality: Quality::Noisy,
    };

    let count = peak_count as f64;
    if count < expected_peaks[0] || count > expected_peaks[1] {
        return assessment;
    }

    let rr = IntervalSeries::from_events(events, fs);
    if rr.len() < cfg.min_intervals {
        return assessment;
    }

    let cv = interval_cv(&rr);
    assessment.interval_cv = Some(cv);
    if cv < cfg.max_interval_cv {
        assessment.quality = Quality::Good;
    }
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ppg::{assess_window_quality, PpgPipelineConfig};
    use crate::synth::SyntheticPpg;

    #[test]
    fn interval_cv_zero_when_constant() {
        let rr = IntervalSeries {
            intervals: vec![0.8, 0.8, 0.8],
        };
        assert!(interval_cv(&rr).abs() < 1e-12);
        assert_eq!(interval_cv(&IntervalSeries::default()), 0.0);
    }

    #[test]
    fn regular_peaks_are_good() {
        let events = Events::from_indices((0..12).map(|k| 5 + k * 25).collect());
        let a = assess_peaks(&events, 30.0, 10.0, &QualityConfig::default());
        assert_eq!(a.quality, Quality::Good);
        assert!(a.is_acceptable());
        assert_eq!(a.expected_peaks, [5.0, 35.0]);
    }

    #[test]
    fn too_few_or_too_many_peaks_are_noisy() {
        let cfg = QualityConfig::default();
        let few = Events::from_indices(vec![10, 40, 70, 100]);
        assert_eq!(assess_peaks(&few, 30.0, 10.0, &cfg).quality, Quality::Noisy);

        let many = Events::from_indices((0..40).map(|k| k * 7).collect());
        assert_eq!(assess_peaks(&many, 30.0, 10.0, &cfg).quality, Quality::Noisy);
    }

    #[test]
    fn needs_three_intervals() {
        let cfg = QualityConfig::default();
        let events = Events::from_indices(vec![0, 25, 50]);
        let a = assess_peaks(&events, 30.0, 2.0, &cfg);
        assert_eq!(a.quality, Quality::Noisy);
        assert_eq!(a.interval_cv, None);
    }

    #[test]
    fn irregular_intervals_are_noisy() {
        let cfg = QualityConfig::default();
        let events = Events::from_indices(vec![0, 10, 40, 48, 80, 90, 130, 136, 170]);
        let a = assess_peaks(&events, 30.0, 6.0, &cfg);
        assert_eq!(a.quality, Quality::Noisy);
        assert!(a.interval_cv.expect("cv") >= 0.25);
    }

    #[test]
    fn clean_pulse_with_light_noise_is_good() {
        let cfg = PpgPipelineConfig::default();
        for seed in 0..5 {
            let series = SyntheticPpg::new(1.2, 30.0)
                .with_noise(1.0)
                .generate(10.0, seed);
            assert_eq!(assess_window_quality(&series, &cfg), Quality::Good, "seed {}", seed);
        }
    }

    #[test]
    fn random_walk_makes_window_noisy() {
        let cfg = PpgPipelineConfig::default();
        for seed in 0..5 {
            let series = SyntheticPpg::new(1.2, 30.0)
                .with_random_walk(15.0)
                .generate(10.0, seed);
            assert_eq!(assess_window_quality(&series, &cfg), Quality::Noisy, "seed {}", seed);
        }
    }
}
