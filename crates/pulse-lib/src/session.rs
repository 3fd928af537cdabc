use crate::{
    conditioner::StreamConditioner,
    config::PulseConfig,
    detectors::ppg::{clean_series, run_pulse_pipeline, PpgPipelineConfig},
    metrics::{
        bpm::valid_intervals,
        hrv::{hrv_time, HRVTime},
        quality::Quality,
    },
    signal::{downsample_values, Sample, SampleSeries},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Live BPM/quality cadence in sample time (seconds).
    pub refresh_interval_s: f64,
    /// Trailing window used for live BPM and quality.
    pub bpm_window_s: f64,
    /// Trailing span run through preprocess + filter for display.
    pub display_process_s: f64,
    /// Trailing span of the processed display data that is shown.
    pub display_window_s: f64,
    /// Measurement countdown started by the first live BPM.
    pub measure_after_detection_s: f64,
    pub min_total_samples: usize,
    pub min_trimmed_samples: usize,
    /// Length of the stored value series.
    pub downsample_target: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_s: 2.0,
            bpm_window_s: 10.0,
            display_process_s: 6.0,
            display_window_s: 5.0,
            measure_after_detection_s: 20.0,
            min_total_samples: 50,
            min_trimmed_samples: 20,
            downsample_target: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    /// No BPM yet.
    Acquiring,
    /// First BPM seen at `trim_at`; countdown running.
    Detected { trim_at: f64 },
    /// No more samples are accepted.
    Complete { trim_at: Option<f64> },
}

impl SessionPhase {
    pub fn trim_at(&self) -> Option<f64> {
        match *self {
            SessionPhase::Acquiring => None,
            SessionPhase::Detected { trim_at } => Some(trim_at),
            SessionPhase::Complete { trim_at } => trim_at,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SessionPhase::Complete { .. })
    }
}

/// BPM and quality published on each refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveEstimate {
    /// Timestamp of the newest sample in the evaluated window.
    pub timestamp: f64,
    pub bpm: Option<u16>,
    pub quality: Quality,
    pub window_samples: usize,
}

/// Where the record's BPM came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BpmSource {
    Final,
    LiveFallback,
    Unavailable,
}

/// Final, storable result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub bpm: Option<u16>,
    pub bpm_source: BpmSource,
    pub quality: Quality,
    /// Span of the cleaned, trimmed series.
    pub duration_seconds: f64,
    /// Empirical rate of the trimmed series.
    pub sample_rate: f64,
    pub sample_count: usize,
    pub trimmed_at: Option<f64>,
    /// Downsampled cleaned values.
    pub values: Vec<f64>,
    pub hrv: Option<HRVTime>,
}

impl MeasurementRecord {
    /// BPM with `0` standing in for "never available".
    pub fn bpm_or_zero(&self) -> u16 {
        self.bpm.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("only {collected} samples collected, at least {required} are needed")]
    TooFewSamples { collected: usize, required: usize },
    #[error("only {remaining} samples remain after trimming, at least {required} are needed")]
    TooFewTrimmedSamples { remaining: usize, required: usize },
}

/// Buffer side of a session: accepts conditioned samples, runs the batch
/// stages on snapshots of the buffer and tracks the session phase.
///
/// The phase moves `Acquiring → Detected → Complete`. The first live BPM
/// fixes the trim point and the final record is computed only from samples
/// at or after it. A stop signal, or the countdown after detection running
/// out, completes the session.
#[derive(Debug, Clone)]
pub struct Recording {
    cfg: SessionConfig,
    pipeline: PpgPipelineConfig,
    buffer: SampleSeries,
    phase: SessionPhase,
    last_refresh: Option<f64>,
    last_estimate: Option<LiveEstimate>,
    last_live_bpm: Option<u16>,
}

impl Recording {
    pub fn new(cfg: SessionConfig, pipeline: PpgPipelineConfig) -> Self {
        Self {
            cfg,
            pipeline,
            buffer: SampleSeries::new(),
            phase: SessionPhase::Acquiring,
            last_refresh: None,
            last_estimate: None,
            last_live_bpm: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn buffer(&self) -> &SampleSeries {
        &self.buffer
    }

    pub fn last_estimate(&self) -> Option<&LiveEstimate> {
        self.last_estimate.as_ref()
    }

    pub fn last_live_bpm(&self) -> Option<u16> {
        self.last_live_bpm
    }

    /// Whether a sample stamped `timestamp` would be buffered.
    pub fn accepts(&self, timestamp: f64) -> bool {
        if self.phase.is_complete() || !timestamp.is_finite() {
            return false;
        }
        self.buffer
            .last()
            .map_or(true, |last| timestamp >= last.timestamp)
    }

    /// Seconds left before the countdown completes the session.
    pub fn remaining_countdown(&self) -> Option<f64> {
        let SessionPhase::Detected { trim_at } = self.phase else {
            return None;
        };
        let now = self.buffer.last().map_or(trim_at, |s| s.timestamp);
        Some((self.cfg.measure_after_detection_s - (now - trim_at)).max(0.0))
    }

    /// Append a conditioned sample. Returns a fresh estimate whenever the
    /// refresh interval has elapsed since the previous one.
    pub fn push(&mut self, sample: Sample) -> Option<LiveEstimate> {
        if self.phase.is_complete() {
            debug!("session complete, dropping sample at {:.3}s", sample.timestamp);
            return None;
        }
        if !self.accepts(sample.timestamp) {
            warn!(
                "dropping out-of-order sample at {:.3}s (last {:.3}s)",
                sample.timestamp,
                self.buffer.last().map_or(f64::NAN, |s| s.timestamp)
            );
            return None;
        }
        if !sample.value.is_finite() {
            warn!("dropping non-finite sample value at {:.3}s", sample.timestamp);
            return None;
        }
        self.buffer.push(sample);

        let now = sample.timestamp;
        let anchor = *self.last_refresh.get_or_insert(now);
        let estimate = if now - anchor >= self.cfg.refresh_interval_s {
            self.last_refresh = Some(now);
            Some(self.refresh(now))
        } else {
            None
        };
        self.advance_countdown(now);
        estimate
    }

    fn refresh(&mut self, now: f64) -> LiveEstimate {
        let window = self.buffer.window(self.cfg.bpm_window_s);
        let result = run_pulse_pipeline(&window, &self.pipeline);
        debug!(
            "refresh at {:.2}s: {} samples, {} peaks, bpm {:?}, {}",
            now,
            window.len(),
            result.events.len(),
            result.bpm,
            result.quality()
        );
        if let Some(bpm) = result.bpm {
            self.last_live_bpm = Some(bpm);
            if self.phase == SessionPhase::Acquiring {
                info!("first pulse detected at {:.2}s ({} bpm), trimming here", now, bpm);
                self.phase = SessionPhase::Detected { trim_at: now };
            }
        }
        let estimate = LiveEstimate {
            timestamp: now,
            bpm: result.bpm,
            quality: result.quality(),
            window_samples: window.len(),
        };
        self.last_estimate = Some(estimate);
        estimate
    }

    fn advance_countdown(&mut self, now: f64) {
        if let SessionPhase::Detected { trim_at } = self.phase {
            if now - trim_at >= self.cfg.measure_after_detection_s {
                info!("measurement countdown elapsed at {:.2}s", now);
                self.phase = SessionPhase::Complete {
                    trim_at: Some(trim_at),
                };
            }
        }
    }

    /// Handle the external stop signal.
    pub fn stop(&mut self) {
        if !self.phase.is_complete() {
            info!("session stopped with {} samples", self.buffer.len());
            self.phase = SessionPhase::Complete {
                trim_at: self.phase.trim_at(),
            };
        }
    }

    /// Cleaned trailing series for live display.
    pub fn display_series(&self) -> SampleSeries {
        let recent = self.buffer.window(self.cfg.display_process_s);
        clean_series(&recent, &self.pipeline).window(self.cfg.display_window_s)
    }

    /// Compute the final record from the trimmed buffer.
    pub fn finish(&self) -> Result<MeasurementRecord, SessionError> {
        let collected = self.buffer.len();
        if collected < self.cfg.min_total_samples {
            warn!("session failed: {} samples collected", collected);
            return Err(SessionError::TooFewSamples {
                collected,
                required: self.cfg.min_total_samples,
            });
        }

        let trimmed_at = self.phase.trim_at();
        let trimmed = match trimmed_at {
            Some(t) => self.buffer.since(t),
            None => self.buffer.clone(),
        };
        if trimmed.len() < self.cfg.min_trimmed_samples {
            warn!("session failed: {} samples after trimming", trimmed.len());
            return Err(SessionError::TooFewTrimmedSamples {
                remaining: trimmed.len(),
                required: self.cfg.min_trimmed_samples,
            });
        }

        let cleaned = clean_series(&trimmed, &self.pipeline);
        let result = run_pulse_pipeline(&trimmed, &self.pipeline);
        let (bpm, bpm_source) = match (result.bpm, self.last_live_bpm) {
            (Some(bpm), _) => (Some(bpm), BpmSource::Final),
            (None, Some(bpm)) => (Some(bpm), BpmSource::LiveFallback),
            (None, None) => (None, BpmSource::Unavailable),
        };
        let valid = valid_intervals(&result.events, result.fs, &self.pipeline.bpm);
        let hrv = (valid.len() >= 2).then(|| hrv_time(&valid));

        let record = MeasurementRecord {
            bpm,
            bpm_source,
            quality: result.quality(),
            duration_seconds: cleaned.duration(),
            sample_rate: trimmed.sampling_rate().unwrap_or(0.0),
            sample_count: trimmed.len(),
            trimmed_at,
            values: downsample_values(&cleaned, self.cfg.downsample_target),
            hrv,
        };
        info!(
            "session finished: bpm {:?} ({:?}), {}, {:.1}s at {:.1} Hz",
            record.bpm, record.bpm_source, record.quality, record.duration_seconds, record.sample_rate
        );
        Ok(record)
    }
}

/// Single-threaded session: the conditioner and the recording driven from one place.
#[derive(Debug, Clone)]
pub struct Session {
    conditioner: StreamConditioner,
    recording: Recording,
}

impl Session {
    pub fn new(cfg: &PulseConfig) -> Self {
        Self {
            conditioner: StreamConditioner::new(cfg.conditioner),
            recording: Recording::new(cfg.session, cfg.pipeline),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.recording.phase()
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Condition and buffer one raw reading.
    ///
    /// A non-finite reading repeats the last conditioned value, or is dropped
    /// when nothing has been conditioned yet.
    pub fn push_raw(&mut self, timestamp: f64, raw: f64) -> Option<LiveEstimate> {
        if !self.recording.accepts(timestamp) {
            return self.recording.push(Sample::new(timestamp, raw));
        }
        let value = self.conditioner.condition(raw);
        self.recording.push(Sample::new(timestamp, value))
    }

    pub fn display_series(&self) -> SampleSeries {
        self.recording.display_series()
    }

    pub fn stop(&mut self) {
        self.recording.stop();
    }

    pub fn finish(&self) -> Result<MeasurementRecord, SessionError> {
        self.recording.finish()
    }

    /// Feed a whole raw series, stop, and return the live estimates and the record.
    pub fn replay(
        cfg: &PulseConfig,
        raw: &SampleSeries,
    ) -> (Vec<LiveEstimate>, Result<MeasurementRecord, SessionError>) {
        let mut session = Session::new(cfg);
        let mut estimates = Vec::new();
        for sample in &raw.samples {
            if session.phase().is_complete() {
                break;
            }
            if let Some(estimate) = session.push_raw(sample.timestamp, sample.value) {
                estimates.push(estimate);
            }
        }
        session.stop();
        (estimates, session.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SyntheticPpg;

    fn pulse(seconds: f64) -> SampleSeries {
        SyntheticPpg::new(1.2, 30.0).generate(seconds, 0)
    }

    #[test]
    fn end_to_end_clean_pulse() {
        let (estimates, record) = Session::replay(&PulseConfig::default(), &pulse(10.0));
        assert!(!estimates.is_empty());
        let record = record.expect("record");
        let bpm = record.bpm.expect("bpm");
        assert!((70..=74).contains(&bpm), "bpm {}", bpm);
        assert_eq!(record.bpm_source, BpmSource::Final);
        assert_eq!(record.quality, Quality::Good);
        assert_eq!(record.values.len(), 100);
        assert!(record.sample_rate > 29.0 && record.sample_rate < 31.5);
        assert!(record.hrv.is_some());
    }

    #[test]
    fn record_serializes_with_provenance() {
        let (_, record) = Session::replay(&PulseConfig::default(), &pulse(10.0));
        let record = record.expect("record");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["bpm_source"], "final");
        assert_eq!(json["quality"], "good");
        let back: MeasurementRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn refresh_runs_on_two_second_cadence() {
        let (estimates, _) = Session::replay(&PulseConfig::default(), &pulse(10.0));
        let stamps: Vec<f64> = estimates.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps.len(), 4);
        for w in stamps.windows(2) {
            assert!(w[1] - w[0] >= 2.0 - 1e-9);
        }
        // the 2 s window holds fewer than 100 samples
        assert_eq!(estimates[0].bpm, None);
        assert_eq!(estimates[0].quality, Quality::Noisy);
    }

    #[test]
    fn first_detection_fixes_trim_point() {
        let cfg = PulseConfig::default();
        let mut session = Session::new(&cfg);
        let raw = pulse(10.0);
        let mut first_bpm_at = None;
        for s in &raw.samples {
            if let Some(e) = session.push_raw(s.timestamp, s.value) {
                if e.bpm.is_some() && first_bpm_at.is_none() {
                    first_bpm_at = Some(e.timestamp);
                }
            }
        }
        let trim_at = first_bpm_at.expect("detected");
        assert_eq!(session.phase(), SessionPhase::Detected { trim_at });
        let recording = session.recording();
        assert_eq!(recording.last_estimate().map(|e| e.timestamp), Some(8.0));
        let left = recording.remaining_countdown().expect("countdown");
        let last = recording.buffer().last().expect("last").timestamp;
        assert!((left - (20.0 - (last - trim_at))).abs() < 1e-9);
        session.stop();
        assert_eq!(
            session.phase(),
            SessionPhase::Complete {
                trim_at: Some(trim_at)
            }
        );
        let record = session.finish().expect("record");
        assert_eq!(record.trimmed_at, Some(trim_at));
        let tail = raw.samples.iter().filter(|s| s.timestamp >= trim_at).count();
        assert_eq!(record.sample_count, tail);
    }

    #[test]
    fn countdown_completes_session() {
        let mut cfg = PulseConfig::default();
        cfg.session.measure_after_detection_s = 4.0;
        let raw = pulse(30.0);
        let mut session = Session::new(&cfg);
        let mut accepted = 0;
        for s in &raw.samples {
            if session.phase().is_complete() {
                break;
            }
            session.push_raw(s.timestamp, s.value);
            accepted += 1;
        }
        assert!(session.phase().is_complete());
        assert!(accepted < raw.len());
        assert_eq!(session.recording().buffer().len(), accepted);
        let before = session.recording().buffer().len();
        assert_eq!(session.push_raw(40.0, 128.0), None);
        assert_eq!(session.recording().buffer().len(), before);
    }

    #[test]
    fn insufficient_data_fails_session() {
        let (estimates, record) = Session::replay(
            &PulseConfig::default(),
            &SyntheticPpg::new(1.2, 30.0).generate_samples(40, 0),
        );
        assert!(estimates.iter().all(|e| e.bpm.is_none()));
        assert_eq!(
            record,
            Err(SessionError::TooFewSamples {
                collected: 40,
                required: 50
            })
        );
    }

    #[test]
    fn short_tail_after_trim_fails_session() {
        let mut cfg = PulseConfig::default();
        cfg.session.min_trimmed_samples = 500;
        let (_, record) = Session::replay(&cfg, &pulse(10.0));
        assert!(matches!(
            record,
            Err(SessionError::TooFewTrimmedSamples { required: 500, .. })
        ));
    }

    #[test]
    fn flat_signal_yields_record_without_bpm() {
        let flat = SampleSeries::from_uniform(&[120.0; 200], 30.0);
        let (_, record) = Session::replay(&PulseConfig::default(), &flat);
        let record = record.expect("record");
        assert_eq!(record.bpm, None);
        assert_eq!(record.bpm_source, BpmSource::Unavailable);
        assert_eq!(record.bpm_or_zero(), 0);
        assert_eq!(record.quality, Quality::Noisy);
        assert_eq!(record.trimmed_at, None);
    }

    #[test]
    fn live_bpm_backs_up_final_estimate() {
        // 4 s of pulse then a flat tail too short for a final BPM
        let mut cfg = PulseConfig::default();
        cfg.session.measure_after_detection_s = 60.0;
        let mut recording = Recording::new(cfg.session, cfg.pipeline);
        let mut raw = pulse(4.0);
        let tail = SampleSeries::from_uniform(&[128.0; 60], 30.0);
        for s in &tail.samples {
            raw.push(Sample::new(4.0 + s.timestamp, s.value));
        }
        for s in &raw.samples {
            recording.push(*s);
        }
        let trim_at = recording.phase().trim_at().expect("detected");
        assert!((trim_at - 4.0).abs() < 1e-9);
        recording.stop();
        let record = recording.finish().expect("record");
        assert_eq!(record.bpm_source, BpmSource::LiveFallback);
        assert_eq!(record.bpm, recording.last_live_bpm());
    }

    #[test]
    fn out_of_order_samples_are_dropped() {
        let mut recording = Recording::new(SessionConfig::default(), PpgPipelineConfig::default());
        recording.push(Sample::new(1.0, 10.0));
        recording.push(Sample::new(0.5, 11.0));
        recording.push(Sample::new(1.0, 12.0));
        assert_eq!(recording.buffer().len(), 2);
    }

    #[test]
    fn display_series_covers_recent_span() {
        let mut session = Session::new(&PulseConfig::default());
        for s in &pulse(12.0).samples {
            session.push_raw(s.timestamp, s.value);
        }
        let display = session.display_series();
        let last = session.recording().buffer().last().expect("last").timestamp;
        assert!(!display.is_empty());
        assert!(display.duration() <= 5.0 + 1e-9);
        assert!(display.first().expect("first").timestamp >= last - 5.0);
        assert_eq!(display.last().expect("last").timestamp, last);
    }

    #[test]
    fn non_finite_readings_do_not_spoil_session() {
        let mut raw = pulse(20.0);
        raw.samples[5].value = f64::NAN;
        raw.samples[200].value = f64::INFINITY;
        let (_, record) = Session::replay(&PulseConfig::default(), &raw);
        let record = record.expect("record");
        let bpm = record.bpm.expect("bpm");
        assert!((70..=74).contains(&bpm), "bpm {}", bpm);
        assert_eq!(record.bpm_source, BpmSource::Final);
        assert!(record.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn leading_non_finite_reading_is_dropped() {
        let mut session = Session::new(&PulseConfig::default());
        session.push_raw(0.0, f64::NAN);
        assert!(session.recording().buffer().is_empty());
        session.push_raw(0.1, 120.0);
        session.push_raw(0.2, f64::NAN);
        let values = session.recording().buffer().values();
        assert_eq!(values, vec![120.0, 120.0]);
    }
}
