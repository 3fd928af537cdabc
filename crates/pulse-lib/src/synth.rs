use crate::signal::{Sample, SampleSeries};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

/// Deterministic synthetic PPG trace for tests and demos:
/// `baseline + amplitude * sin(2π f t)` plus optional white noise and random walk.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticPpg {
    pub freq_hz: f64,
    pub fs: f64,
    pub baseline: f64,
    pub amplitude: f64,
    /// Standard deviation of additive Gaussian noise.
    pub noise_std: f64,
    /// Standard deviation of each random-walk increment.
    pub walk_step_std: f64,
}

impl SyntheticPpg {
    pub fn new(freq_hz: f64, fs: f64) -> Self {
        Self {
            freq_hz,
            fs,
            baseline: 128.0,
            amplitude: 20.0,
            noise_std: 0.0,
            walk_step_std: 0.0,
        }
    }

    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn with_random_walk(mut self, step_std: f64) -> Self {
        self.walk_step_std = step_std;
        self
    }

    /// `seconds * fs` samples (rounded) starting at t = 0.
    pub fn generate(&self, seconds: f64, seed: u64) -> SampleSeries {
        let n = (seconds * self.fs).round().max(0.0) as usize;
        self.generate_samples(n, seed)
    }

    pub fn generate_samples(&self, n: usize, seed: u64) -> SampleSeries {
        let fs = self.fs.max(f64::MIN_POSITIVE);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut walk = 0.0;
        let mut series = SampleSeries::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / fs;
            let mut value = self.baseline + self.amplitude * (2.0 * PI * self.freq_hz * t).sin();
            if self.walk_step_std > 0.0 {
                walk += self.walk_step_std * gaussian(&mut rng);
                value += walk;
            }
            if self.noise_std > 0.0 {
                value += self.noise_std * gaussian(&mut rng);
            }
            series.push(Sample::new(t, value));
        }
        series
    }
}

/// Standard normal draw via Box–Muller.
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{mean, std_dev};

    #[test]
    fn same_seed_same_trace() {
        let source = SyntheticPpg::new(1.2, 30.0).with_noise(3.0).with_random_walk(1.0);
        assert_eq!(source.generate(5.0, 11), source.generate(5.0, 11));
        assert_ne!(source.generate(5.0, 11), source.generate(5.0, 12));
    }

    #[test]
    fn sample_count_and_clock() {
        let series = SyntheticPpg::new(1.0, 30.0).generate(10.0, 0);
        assert_eq!(series.len(), 300);
        assert_eq!(series.samples[30].timestamp, 1.0);
    }

    #[test]
    fn noise_has_requested_spread() {
        let source = SyntheticPpg::new(1.0, 100.0)
            .with_amplitude(0.0)
            .with_baseline(0.0)
            .with_noise(2.0);
        let values = source.generate_samples(20_000, 3).values();
        let mu = mean(&values);
        assert!(mu.abs() < 0.1);
        assert!((std_dev(&values, mu) - 2.0).abs() < 0.1);
    }
}
