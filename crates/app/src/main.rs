mod objects;
mod preset;

use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use reactive_visualiser_core::scene::headless::{HeadlessRenderer, HeadlessScene};
use reactive_visualiser_core::scene::MeshNode;
use reactive_visualiser_core::{
    AppConfig, AudioEngine, AudioFeed, AudioMode, Result, Scheduler, TickOutcome, Visualiser,
    VisualiserError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::objects::Catalog;
use crate::preset::Preset;

type HeadlessScheduler = Scheduler<MeshNode, HeadlessScene, HeadlessRenderer>;

/// Host refresh interval the live loop ticks at, independent of the logic
/// frame rate.
const DISPLAY_INTERVAL: Duration = Duration::from_micros(8_333);
const CAPTURE_BLOCK: usize = 512;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Live(args) => run_live(config, &cli.viewport, args),
        Commands::Render(args) => run_render(config, &cli.viewport, args),
    }
}

fn run_live(mut config: AppConfig, viewport: &Viewport, args: LiveArgs) -> Result<()> {
    if let Some(fps) = args.fps {
        config.scheduler.fps = fps;
    }
    let preset = load_preset(args.source.preset.as_deref())?;
    let track = load_track(&args.source, &mut config)?;
    tracing::info!(
        preset = preset.name.as_deref(),
        fps = config.scheduler.fps,
        seconds = track.len() as f64 / f64::from(config.audio.sample_rate),
        "starting live mode"
    );

    let mut audio = AudioEngine::new(AudioMode::Live, &config.audio)?;
    let feed = audio.start()?;
    let mut scheduler = build_scheduler(&config, viewport, &preset)?;
    scheduler.attach_audio(audio);

    let sample_rate = config.audio.sample_rate;
    let capture = thread::spawn(move || stream_track(&feed, &track, sample_rate));

    scheduler.start();
    let started = Instant::now();
    let mut summary = LiveSummary::default();
    while !capture.is_finished() {
        match scheduler.tick(started.elapsed()) {
            TickOutcome::Ran(report) => {
                summary.passes += 1;
                summary.failures += report.failed.len();
            }
            TickOutcome::Throttled => summary.throttled += 1,
            TickOutcome::AudioUnavailable => summary.starved += 1,
            TickOutcome::Stopped => break,
        }
        thread::sleep(DISPLAY_INTERVAL);
    }
    scheduler.stop();

    capture
        .join()
        .map_err(|_| VisualiserError::msg("capture thread panicked"))??;
    tracing::info!(
        passes = summary.passes,
        throttled = summary.throttled,
        starved = summary.starved,
        failures = summary.failures,
        frames = scheduler.renderer().frames(),
        "live session finished"
    );
    Ok(())
}

#[derive(Debug, Default)]
struct LiveSummary {
    passes: u64,
    throttled: u64,
    starved: u64,
    failures: usize,
}

/// Pushes `track` into `feed` at playback speed, one block at a time.
fn stream_track(feed: &AudioFeed, track: &[f32], sample_rate: u32) -> Result<()> {
    let block_duration = Duration::from_secs_f64(CAPTURE_BLOCK as f64 / f64::from(sample_rate));
    for block in track.chunks(CAPTURE_BLOCK) {
        feed.push(block)?;
        thread::sleep(block_duration);
    }
    Ok(())
}

fn run_render(mut config: AppConfig, viewport: &Viewport, args: RenderArgs) -> Result<()> {
    let preset = load_preset(args.source.preset.as_deref())?;
    let track = load_track(&args.source, &mut config)?;
    tracing::info!(output = ?args.output, fps = args.fps, "running offline render");

    let audio = AudioEngine::with_track(&config.audio, track)?;
    let mut scheduler = build_scheduler(&config, viewport, &preset)?;
    scheduler.attach_audio(audio);

    let mut frames = Vec::new();
    let rendered = scheduler.render_offline(args.fps, |report, renderer| {
        for (id, err) in &report.failed {
            tracing::debug!(%id, error = %err, frame = report.frame, "object failed");
        }
        frames.push(FrameRecord {
            frame: report.frame,
            time: report.time,
            drawn: renderer.last_drawn().iter().map(ToString::to_string).collect(),
            skipped: report.skipped.iter().map(ToString::to_string).collect(),
            failed: report
                .failed
                .iter()
                .map(|(id, err)| format!("{id}: {err}"))
                .collect(),
        });
        Ok(())
    })?;

    let report = RenderReport {
        preset: preset.name.clone(),
        fps: args.fps,
        frames,
    };
    let writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(writer, &report)?;
    tracing::info!(frames = rendered, output = ?args.output, "offline render written");
    Ok(())
}

#[derive(Debug, Serialize)]
struct RenderReport {
    preset: Option<String>,
    fps: f64,
    frames: Vec<FrameRecord>,
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    frame: u64,
    time: f64,
    drawn: Vec<String>,
    skipped: Vec<String>,
    failed: Vec<String>,
}

/// Queues the preset's objects on a [`Visualiser`] before the scheduler
/// exists, then hands them over to a freshly built one.
fn build_scheduler(
    config: &AppConfig,
    viewport: &Viewport,
    preset: &Preset,
) -> Result<HeadlessScheduler> {
    let catalog = Catalog::new()?;
    let mut visualiser = Visualiser::new();
    preset.register(&mut visualiser, &catalog);

    let mut scheduler = Scheduler::new(
        config,
        HeadlessScene::new(),
        HeadlessRenderer::new(viewport.width, viewport.height),
    )?;
    scheduler.resize(viewport.width, viewport.height);
    if let Some(color) = &preset.background_color {
        scheduler.set_background_color(color)?;
    }
    visualiser.attach(scheduler);

    let mut scheduler = visualiser
        .detach()
        .ok_or_else(|| VisualiserError::msg("scheduler was not attached"))?;
    preset.animate(&mut scheduler);
    Ok(scheduler)
}

fn load_preset(path: Option<&Path>) -> Result<Preset> {
    match path {
        Some(path) => Preset::load(path),
        None => Ok(Preset::demo()),
    }
}

/// Decodes the WAV input to mono, or synthesizes a tone when there is none.
/// A WAV file's own sample rate replaces the configured one.
fn load_track(source: &SourceArgs, config: &mut AppConfig) -> Result<Vec<f32>> {
    let Some(path) = &source.input else {
        return Ok(synthesize(config.audio.sample_rate, source.seconds));
    };

    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    if spec.sample_rate != config.audio.sample_rate {
        tracing::info!(
            configured = config.audio.sample_rate,
            file = spec.sample_rate,
            "using the input's sample rate"
        );
        config.audio.sample_rate = spec.sample_rate;
    }

    Ok(interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}

fn wav_error(err: hound::Error) -> VisualiserError {
    match err {
        hound::Error::IoError(err) => VisualiserError::Io(err),
        other => VisualiserError::msg(format!("failed to read wav input: {other}")),
    }
}

/// A bass tone and a lead tone with a slow pulse, for running without input.
fn synthesize(sample_rate: u32, seconds: f64) -> Vec<f32> {
    let rate = sample_rate as f32;
    let len = (seconds.max(0.0) * f64::from(sample_rate)) as usize;
    (0..len)
        .map(|index| {
            let t = index as f32 / rate;
            let pulse = 0.5 + 0.5 * (TAU * 2.0 * t).sin();
            0.4 * (TAU * 55.0 * t).sin() + 0.3 * pulse * (TAU * 880.0 * t).sin()
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive scene engine", long_about = None)]
struct Cli {
    /// JSON configuration file. Missing sections use defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    viewport: Viewport,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Viewport {
    #[arg(long, global = true, default_value_t = 1280)]
    width: u32,
    #[arg(long, global = true, default_value_t = 720)]
    height: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream audio in real time and tick the scheduler like a display would.
    Live(LiveArgs),
    /// Render a whole track at a fixed step and write a JSON frame report.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// WAV file to play. Without one a synthetic tone is used.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Preset file to load instead of the built-in demo scene.
    #[arg(short, long)]
    preset: Option<PathBuf>,
    /// Length of the synthetic tone in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,
}

#[derive(Args, Debug)]
struct LiveArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Overrides the configured logic frame rate.
    #[arg(long)]
    fps: Option<f64>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Where to write the frame report.
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}
