use crate::{
    detectors::ppg::{clean_series, detect_peaks, PpgPipelineConfig},
    signal::{downsample, SampleSeries},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Unconnected markers, e.g. detected peaks.
    Markers(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) | Series::Markers(line) => &line.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: Some("time (s)".into()),
            },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x range, y range)` over every finite point, `None` for an empty figure.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut points = self
            .series
            .iter()
            .flat_map(|s| s.points().iter())
            .filter(|p| p[0].is_finite() && p[1].is_finite());
        let first = points.next()?;
        let init = ([first[0], first[0]], [first[1], first[1]]);
        let (mut x, mut y) = points.fold(init, |(x, y), p| {
            ([x[0].min(p[0]), x[1].max(p[0])], [y[0].min(p[1]), y[1].max(p[1])])
        });
        for range in [&mut x, &mut y] {
            if range[1] <= range[0] {
                range[1] = range[0] + 1.0;
            }
        }
        Some((x, y))
    }
}

pub fn series_points(series: &SampleSeries) -> Vec<[f64; 2]> {
    series
        .samples
        .iter()
        .map(|s| [s.timestamp, s.value])
        .collect()
}

pub fn figure_from_series(title: &str, series: &SampleSeries, max_points: usize, color: u32) -> Figure {
    let mut fig = Figure::new(Some(title.into()));
    fig.add_series(Series::Line(LineSeries {
        name: title.into(),
        points: downsample(&series_points(series), max_points),
        style: Style {
            width: 1.4,
            color: Color(color),
        },
    }));
    fig
}

/// Cleaned waveform of `raw` with its detected peaks marked.
pub fn pulse_figure(raw: &SampleSeries, cfg: &PpgPipelineConfig, max_points: usize) -> Figure {
    let cleaned = clean_series(raw, cfg);
    let mut fig = figure_from_series("PPG (cleaned)", &cleaned, max_points, 0x1F77B4);
    fig.y.label = Some("normalized intensity".into());
    let peaks = detect_peaks(&cleaned.values(), &cfg.peaks);
    let markers = peaks
        .indices
        .iter()
        .filter_map(|&i| cleaned.samples.get(i))
        .map(|s| [s.timestamp, s.value])
        .collect();
    fig.add_series(Series::Markers(LineSeries {
        name: "peaks".into(),
        points: markers,
        style: Style {
            width: 3.0,
            color: Color(0xD62728),
        },
    }));
    fig
}
