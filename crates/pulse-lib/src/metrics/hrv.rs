use crate::signal::IntervalSeries;
use serde::{Deserialize, Serialize};

/// Time-domain variability of inter-beat intervals (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HRVTime {
    pub n: usize,
    pub avnn: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

pub fn hrv_time(rr: &IntervalSeries) -> HRVTime {
    let n = rr.intervals.len();
    let avnn = if n > 0 {
        rr.intervals.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };
    if n < 2 {
        return HRVTime {
            n,
            avnn,
            sdnn: 0.0,
            rmssd: 0.0,
            pnn50: 0.0,
        };
    }
    let sdnn = (rr.intervals.iter().map(|x| (x - avnn).powi(2)).sum::<f64>()
        / (n as f64 - 1.0))
        .sqrt();
    let rmssd = (rr
        .intervals
        .windows(2)
        .map(|w| (w[1] - w[0]).powi(2))
        .sum::<f64>()
        / (n as f64 - 1.0))
        .sqrt();
    let over_50ms = rr
        .intervals
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > 0.050)
        .count();
    let pnn50 = over_50ms as f64 / (n as f64 - 1.0);

    HRVTime {
        n,
        avnn,
        sdnn,
        rmssd,
        pnn50,
    }
}
