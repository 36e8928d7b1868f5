use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use waveform_visualiser_core::{
    capture_callback, AppConfig, AudioDriver, FrameClock, FrameRecorder, FrameStats, Result,
    SetAnalyzer, SetFeatures, ToneDriver, ToneGenerator, VertexSink, VisualiserError,
    WaveformPoint, WaveformSession, WaveformSnapshot,
};

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            config,
            seconds,
            tone,
        } => run_live(config.as_deref(), seconds, tone),
        Commands::Snapshot {
            config,
            output,
            periods,
            tone,
            points,
        } => run_snapshot(config.as_deref(), &output, periods, tone, points),
        Commands::Config { output } => run_config(output.as_deref()),
    }
}

fn run_live(config: Option<&Path>, seconds: f32, tone: f32) -> Result<()> {
    let duration = Duration::try_from_secs_f32(seconds)
        .ok()
        .filter(|duration| !duration.is_zero())
        .ok_or(VisualiserError::InvalidInput("--seconds must be a positive duration"))?;
    let config = load_config(config)?;
    tracing::info!(seconds, tone, "starting live mode");

    let session = WaveformSession::new(config.history)?;
    let reader = session.reader();
    let mut driver = ToneDriver::new(config.audio.clone(), tone)?;
    driver.start(capture_callback(session.sink()))?;
    let spec = driver.stream_spec();
    tracing::info!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        period_ms = spec.period().as_secs_f32() * 1_000.0,
        "audio stream running"
    );

    let mut analyzer = SetAnalyzer::new();
    let mut clock = FrameClock::new(config.render.frame_rate)?;
    let mut renderer = FrameRecorder::new();
    let report_every = config.render.frame_rate.round().max(1.0) as u64;

    let mut snapshot = reader.snapshot()?;

    while clock.elapsed() < duration {
        let frame = clock.tick();
        reader.snapshot_into(&mut snapshot)?;
        let features = analyze_newest(&mut analyzer, &snapshot)?;
        let points = snapshot.points(&config.render, features.as_ref());
        renderer.submit(&points)?;

        let stats = renderer.last_frame();
        tracing::debug!(
            frame,
            cursor = snapshot.cursor(),
            points = stats.point_count,
            max_displacement = stats.max_displacement,
            "frame rendered"
        );
        if frame % report_every == 0 {
            if let Some(features) = features {
                tracing::info!(
                    frame,
                    rms = features.rms,
                    centroid = features.spectral_centroid,
                    onset = features.onset,
                    "audio features"
                );
            }
        }
    }

    driver.stop()?;
    let last = renderer.last_frame();
    tracing::info!(
        frames = renderer.frames(),
        periods = driver.periods_delivered(),
        points = last.point_count,
        mean_alpha = last.mean_alpha,
        "live mode finished"
    );
    Ok(())
}

fn run_snapshot(
    config: Option<&Path>,
    output: &Path,
    periods: usize,
    tone: f32,
    include_points: bool,
) -> Result<()> {
    let config = load_config(config)?;
    tracing::info!(?output, periods, tone, "capturing snapshot");

    let session = WaveformSession::new(config.history)?;
    let sink = session.sink();
    let channels = config.audio.channels;
    let mut generator = ToneGenerator::new(config.audio.sample_rate, tone);
    let mut buffer = vec![0.0_f32; config.audio.period_frames * channels];
    for _ in 0..periods {
        generator.render(&mut buffer, channels);
        sink.capture(&buffer, channels)?;
    }

    let snapshot = session.reader().snapshot()?;
    let mut analyzer = SetAnalyzer::new();
    let features = analyze_newest(&mut analyzer, &snapshot)?;
    let points = snapshot.points(&config.render, features.as_ref());
    let dump = SnapshotDump {
        stats: FrameStats::from_points(&points),
        features,
        points: include_points.then_some(points),
        snapshot,
    };

    std::fs::write(output, serde_json::to_vec_pretty(&dump)?)?;
    tracing::info!(?output, "snapshot written");
    Ok(())
}

fn run_config(output: Option<&Path>) -> Result<()> {
    let json = AppConfig::default().to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(?path, "default configuration written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn analyze_newest(
    analyzer: &mut SetAnalyzer,
    snapshot: &WaveformSnapshot,
) -> Result<Option<SetFeatures>> {
    if snapshot.usable_samples() < 2 {
        return Ok(None);
    }
    analyzer.analyze(snapshot.newest()).map(Some)
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Serialize)]
struct SnapshotDump {
    stats: FrameStats,
    features: Option<SetFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<Vec<WaveformPoint>>,
    snapshot: WaveformSnapshot,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive waveform visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the visualiser from the synthetic tone driver in real time.
    Live {
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How long to run the frame loop.
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f32,
        /// Frequency of the test tone in Hz.
        #[arg(short, long, default_value_t = 220.0)]
        tone: f32,
    },
    /// Capture a number of periods offline and dump the snapshot as JSON.
    Snapshot {
        /// Output path for the JSON dump.
        output: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Driver periods to capture before taking the snapshot.
        #[arg(short, long, default_value_t = 120)]
        periods: usize,
        /// Frequency of the test tone in Hz.
        #[arg(short, long, default_value_t = 220.0)]
        tone: f32,
        /// Include the rendered point geometry in the dump.
        #[arg(long)]
        points: bool,
    },
    /// Print (or write) the default configuration.
    Config {
        /// Write to this path instead of stdout.
        output: Option<PathBuf>,
    },
}
