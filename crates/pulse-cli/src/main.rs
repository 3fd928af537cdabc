use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use plotters::prelude::*;
use pulse_lib::{
    config::{read_config, PulseConfig},
    detectors::ppg::{clean_series, run_pulse_pipeline},
    io::{csv::write_csv_samples, read_series, text as text_io},
    monitor::{spawn_monitor, MonitorUpdate},
    plot::{pulse_figure, Figure, Series},
    session::{LiveEstimate, MeasurementRecord, Session, SessionPhase},
    signal::{downsample_values, SampleSeries},
    synth::SyntheticPpg,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(name = "pulse", version, about = "Camera PPG pulse analysis tools")]
struct Cli {
    /// TOML file overriding pipeline and session parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Sample file (.csv/.tsv or plain text); stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Nominal sampling rate for inputs without timestamps
    #[arg(long)]
    fs: Option<f64>,
    /// Value column for CSV input
    #[arg(long)]
    column: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full recording session and print the measurement record
    Analyze {
        #[command(flatten)]
        input: InputArgs,
    },
    /// BPM and quality of the trailing window
    Estimate {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value_t = 10.0)]
        window_s: f64,
    },
    /// Print the preprocessed, band-limited series
    Clean {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print the stored (downsampled, cleaned) value series
    Downsample {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        target: Option<usize>,
    },
    /// Emit a synthetic PPG trace as timestamp,value CSV
    Simulate {
        #[arg(long, default_value_t = 1.2)]
        freq_hz: f64,
        #[arg(long, default_value_t = 30.0)]
        fs: f64,
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0.0)]
        walk: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Replay an input through the threaded live monitor (JSON lines)
    Live {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Render the cleaned series with detected peaks to a PNG
    Plot {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 2000)]
        max_points: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => read_config(path)?,
        None => PulseConfig::default(),
    };
    match cli.command {
        Commands::Analyze { input } => cmd_analyze(&cfg, &input)?,
        Commands::Estimate { input, window_s } => cmd_estimate(&cfg, &input, window_s)?,
        Commands::Clean { input, json } => cmd_clean(&cfg, &input, json)?,
        Commands::Downsample { input, target } => cmd_downsample(&cfg, &input, target)?,
        Commands::Simulate {
            freq_hz,
            fs,
            seconds,
            noise,
            walk,
            seed,
        } => cmd_simulate(freq_hz, fs, seconds, noise, walk, seed)?,
        Commands::Live { input } => cmd_live(&cfg, &input)?,
        Commands::Plot {
            input,
            out,
            max_points,
        } => cmd_plot(&cfg, &input, &out, max_points)?,
    }
    Ok(())
}

fn read_input(args: &InputArgs) -> Result<SampleSeries> {
    match &args.input {
        Some(path) => read_series(path, args.fs, args.column.as_deref()),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_samples(&buf, args.fs).context("parsing stdin")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_analyze(cfg: &PulseConfig, args: &InputArgs) -> Result<()> {
    let raw = read_input(args)?;
    let (estimates, record) = Session::replay(cfg, &raw);
    info!("{} live estimates over {} samples", estimates.len(), raw.len());
    let record = record.context("measurement failed")?;
    print_json(&record)
}

#[derive(Serialize)]
struct EstimateOutput {
    bpm: Option<u16>,
    quality: pulse_lib::metrics::quality::Quality,
    peaks: Vec<usize>,
    sample_rate: f64,
    sample_count: usize,
    interval_cv: Option<f64>,
}

fn cmd_estimate(cfg: &PulseConfig, args: &InputArgs, window_s: f64) -> Result<()> {
    let raw = read_input(args)?;
    let window = raw.window(window_s);
    let result = run_pulse_pipeline(&window, &cfg.pipeline);
    print_json(&EstimateOutput {
        bpm: result.bpm,
        quality: result.quality(),
        peaks: result.events.indices.clone(),
        sample_rate: result.fs,
        sample_count: result.sample_count,
        interval_cv: result.assessment.interval_cv,
    })
}

fn cmd_clean(cfg: &PulseConfig, args: &InputArgs, json: bool) -> Result<()> {
    let raw = read_input(args)?;
    let cleaned = clean_series(&raw, &cfg.pipeline);
    if json {
        return print_json(&cleaned);
    }
    write_csv_samples(io::stdout().lock(), &cleaned)
}

fn cmd_downsample(cfg: &PulseConfig, args: &InputArgs, target: Option<usize>) -> Result<()> {
    let raw = read_input(args)?;
    let cleaned = clean_series(&raw, &cfg.pipeline);
    let target = target.unwrap_or(cfg.session.downsample_target);
    print_json(&downsample_values(&cleaned, target))
}

fn cmd_simulate(freq_hz: f64, fs: f64, seconds: f64, noise: f64, walk: f64, seed: u64) -> Result<()> {
    if fs <= 0.0 {
        return Err(anyhow!("Sampling frequency must be positive"));
    }
    let series = SyntheticPpg::new(freq_hz, fs)
        .with_noise(noise)
        .with_random_walk(walk)
        .generate(seconds, seed);
    write_csv_samples(io::stdout().lock(), &series)
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveLine<'a> {
    Estimate(&'a LiveEstimate),
    Phase(&'a SessionPhase),
    Record(&'a MeasurementRecord),
}

fn cmd_live(cfg: &PulseConfig, args: &InputArgs) -> Result<()> {
    let raw = read_input(args)?;
    let (mut capture, monitor) = spawn_monitor(cfg);
    let producer = std::thread::spawn(move || {
        for s in &raw.samples {
            if capture.submit(s.timestamp, s.value).is_err() {
                // session completed on its own
                return;
            }
        }
        let _ = capture.stop();
    });

    let mut printed = Ok(());
    let record = monitor.wait_with(|update| {
        let line = match update {
            MonitorUpdate::Estimate(e) => LiveLine::Estimate(e),
            MonitorUpdate::Phase(p) => LiveLine::Phase(p),
            _ => return,
        };
        if printed.is_ok() {
            printed = print_json(&line);
        }
    });
    producer
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?;
    printed?;
    let record = record.context("measurement failed")?;
    print_json(&LiveLine::Record(&record))
}

fn cmd_plot(cfg: &PulseConfig, args: &InputArgs, out: &Path, max_points: usize) -> Result<()> {
    let raw = read_input(args)?;
    let fig = pulse_figure(&raw, &cfg.pipeline, max_points);
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let ([x_min, x_max], [y_min, y_max]) =
        fig.bounds().ok_or_else(|| anyhow!("nothing to plot"))?;
    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    &RGBColor(r, g, b),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.style.color.rgb();
                let size = markers.style.width.round().max(1.0) as i32;
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), size, RGBColor(r, g, b).filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
