use log::warn;
use serde::{Deserialize, Serialize};

/// Per-sample smoothing and jump clamping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    /// Jump `|raw - smoothed|` above which the sample is treated as a motion artifact.
    pub noise_jump: f64,
    /// Smoothing factor used for artifact-sized jumps.
    pub artifact_alpha: f64,
    /// Smoothing factor used otherwise.
    pub tracking_alpha: f64,
    /// Maximum absolute change between consecutive emitted values.
    pub max_step: f64,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            noise_jump: 60.0,
            artifact_alpha: 0.15,
            tracking_alpha: 0.6,
            max_step: 18.0,
        }
    }
}

/// Stateful O(1) conditioner applied to every raw sample as it arrives.
///
/// Holds only the previous smoothed value and the previous emitted value, so
/// it never allocates. Call [`StreamConditioner::reset`] at the start of each
/// recording session.
#[derive(Debug, Clone)]
pub struct StreamConditioner {
    cfg: ConditionerConfig,
    smoothed: Option<f64>,
    emitted: Option<f64>,
}

impl StreamConditioner {
    pub fn new(cfg: ConditionerConfig) -> Self {
        Self {
            cfg,
            smoothed: None,
            emitted: None,
        }
    }

    pub fn reset(&mut self) {
        self.smoothed = None;
        self.emitted = None;
    }

    /// Last emitted value, if any sample has been conditioned since the last reset.
    pub fn last_emitted(&self) -> Option<f64> {
        self.emitted
    }

    /// Condition one raw value and return the value to append to the series.
    ///
    /// A non-finite reading leaves the state untouched and repeats the last
    /// emitted value; with nothing emitted yet it is returned as is.
    pub fn condition(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            warn!("conditioner: holding last value over non-finite reading {raw}");
            return self.emitted.unwrap_or(raw);
        }
        let (Some(prev_smoothed), Some(prev_emitted)) = (self.smoothed, self.emitted) else {
            self.smoothed = Some(raw);
            self.emitted = Some(raw);
            return raw;
        };

        let alpha = if (raw - prev_smoothed).abs() > self.cfg.noise_jump {
            self.cfg.artifact_alpha
        } else {
            self.cfg.tracking_alpha
        };
        let smoothed = prev_smoothed * (1.0 - alpha) + raw * alpha;

        // max/min rather than clamp: a NaN bound must not panic
        let step = self.cfg.max_step.abs();
        let emitted = prev_emitted + (smoothed - prev_emitted).max(-step).min(step);

        self.smoothed = Some(smoothed);
        self.emitted = Some(emitted);
        emitted
    }
}

impl Default for StreamConditioner {
    fn default() -> Self {
        Self::new(ConditionerConfig::default())
    }
}
