use serde::{Deserialize, Serialize};

/// One brightness reading from the capture source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since session start (monotonic)
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered, timestamped samples. Timestamps are non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    pub samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Build a series with timestamps `i / fs` for raw values that carry no clock.
    pub fn from_uniform(values: &[f64], fs: f64) -> Self {
        let fs = fs.max(f64::MIN_POSITIVE);
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Sample::new(i as f64 / fs, value))
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// Elapsed time between the first and last sample, 0 for fewer than two samples.
    pub fn duration(&self) -> f64 {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
            _ => 0.0,
        }
    }

    /// Empirical sampling rate: `count / (last - first)`.
    ///
    /// Returns `None` when fewer than two samples exist or they share a timestamp.
    pub fn sampling_rate(&self) -> Option<f64> {
        let span = self.duration();
        if self.len() < 2 || span <= 0.0 {
            return None;
        }
        Some(self.len() as f64 / span)
    }

    /// Trailing samples whose timestamp is at least `last - window_s`.
    pub fn window(&self, window_s: f64) -> SampleSeries {
        let Some(last) = self.last() else {
            return SampleSeries::new();
        };
        let cutoff = last.timestamp - window_s;
        let start = self.samples.partition_point(|s| s.timestamp < cutoff);
        SampleSeries {
            samples: self.samples[start..].to_vec(),
        }
    }

    /// Samples at or after `timestamp`.
    pub fn since(&self, timestamp: f64) -> SampleSeries {
        let start = self.samples.partition_point(|s| s.timestamp < timestamp);
        SampleSeries {
            samples: self.samples[start..].to_vec(),
        }
    }

    /// Same timestamps, new values. `values` must have the series' length.
    pub fn with_values(&self, values: &[f64]) -> SampleSeries {
        debug_assert_eq!(values.len(), self.len());
        SampleSeries {
            samples: self
                .samples
                .iter()
                .zip(values)
                .map(|(s, &value)| Sample::new(s.timestamp, value))
                .collect(),
        }
    }
}

impl FromIterator<Sample> for SampleSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Pick `target` evenly spaced items at `floor(i * len / target)`.
///
/// Inputs no longer than `target` are returned unchanged.
pub fn downsample<T: Copy>(items: &[T], target: usize) -> Vec<T> {
    if items.len() <= target {
        return items.to_vec();
    }
    let len = items.len();
    (0..target).map(|i| items[i * len / target]).collect()
}

/// Value-only downsampled form of a series, used for storage.
pub fn downsample_values(series: &SampleSeries, target: usize) -> Vec<f64> {
    downsample(&series.values(), target)
}

/// Point events on a timeline (e.g., pulse peak indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Inter-peak intervals (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSeries {
    pub intervals: Vec<f64>,
}

impl IntervalSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        if fs <= 0.0 {
            return Self::default();
        }
        let intervals = events
            .indices
            .windows(2)
            .map(|w| (w[1] as f64 - w[0] as f64) / fs)
            .collect();
        Self { intervals }
    }

    /// Keep only intervals inside `[min_s, max_s]`.
    pub fn within(&self, min_s: f64, max_s: f64) -> Self {
        Self {
            intervals: self
                .intervals
                .iter()
                .copied()
                .filter(|&dt| (min_s..=max_s).contains(&dt))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation around `mean`.
pub(crate) fn std_dev(data: &[f64], mean: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Median of an unsorted slice; the mean of the two middle values for even lengths.
pub(crate) fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    }
}
