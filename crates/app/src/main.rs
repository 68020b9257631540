use std::{
    f32::consts::TAU,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use rhythm_playback_core::{
    glam::Vec2, spawn_pulse_loop, spawn_update_loop, AppConfig, AudioFeatureSmoother, AudioTrack,
    Beatmap, FrameSnapshot, RenderDriver, Renderer, ReplayData, ReplaySet, Session,
    SimulatedTrack, UpdatePacer,
};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Time the synthesized track keeps playing after the last object.
const TRACK_TAIL_SECONDS: f64 = 2.0;
const CLICK_SECONDS: f32 = 0.05;
const CLICK_HZ: f32 = 80.0;
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Frames between two logged frame summaries.
const LOG_EVERY: u64 = 60;

fn main() -> rhythm_playback_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            session,
            config,
            seconds,
            width,
            height,
            silent,
        } => run_play(
            &session,
            config.as_deref(),
            seconds,
            Vec2::new(width, height),
            silent,
        ),
        Commands::Inspect { session, config } => run_inspect(&session, config.as_deref()),
    }
}

/// Beatmap and replays played back together.
#[derive(Debug, Deserialize)]
struct SessionFile {
    beatmap: Beatmap,
    #[serde(default)]
    replays: Vec<ReplayData>,
}

fn load_inputs(
    session: &Path,
    config: Option<&Path>,
) -> rhythm_playback_core::Result<(SessionFile, AppConfig)> {
    let file: SessionFile = serde_json::from_str(&fs::read_to_string(session)?)?;
    let config = match config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    Ok((file, config))
}

fn run_play(
    session_path: &Path,
    config_path: Option<&Path>,
    seconds: f64,
    viewport: Vec2,
    silent: bool,
) -> rhythm_playback_core::Result<()> {
    let (file, config) = load_inputs(session_path, config_path)?;
    tracing::info!(
        beatmap = %file.beatmap.full_name(),
        replays = file.replays.len(),
        seconds,
        "starting playback"
    );

    let track: Option<Arc<dyn AudioTrack>> = if silent {
        None
    } else {
        Some(Arc::new(metronome_track(&file.beatmap, &config)?))
    };

    let session = Session::new(
        &file.beatmap,
        ReplaySet::new(file.replays),
        &config,
        track.clone(),
        viewport,
    )?;
    let shared = session.shared();

    let performance = config.performance;
    let pacer = UpdatePacer::with_limits(performance.base_update_rate, performance.max_update_rate);
    let mut driver = RenderDriver::new(shared.clone(), pacer.handle(), &config, viewport);

    let period = Duration::from_millis(performance.pulse_period_ms.max(1));
    let smoother = AudioFeatureSmoother::with_tick(
        config.audio.pulse_mode(),
        config.audio.beat_scale,
        period.as_secs_f64() * 1000.0,
    );

    spawn_update_loop(session, pacer)?;
    spawn_pulse_loop(track, shared, smoother, period)?;

    let mut renderer = TracingRenderer::default();
    let started = Instant::now();
    while started.elapsed().as_secs_f64() < seconds {
        driver.frame(&mut renderer)?;
        thread::sleep(FRAME_INTERVAL);
    }

    tracing::info!(frames = renderer.frames, "playback finished");
    Ok(())
}

fn run_inspect(session_path: &Path, config_path: Option<&Path>) -> rhythm_playback_core::Result<()> {
    let (file, config) = load_inputs(session_path, config_path)?;
    let session = Session::new(
        &file.beatmap,
        ReplaySet::new(file.replays),
        &config,
        None,
        Vec2::new(1920.0, 1080.0),
    )?;

    let plan = session.plan();
    let timeline: serde_json::Map<String, serde_json::Value> = session
        .effects()
        .timeline()
        .into_iter()
        .map(|(name, events)| {
            let events = events
                .iter()
                .map(|event| {
                    json!({
                        "start_ms": event.start,
                        "end_ms": event.end,
                        "from": event.start_value,
                        "to": event.end_value,
                    })
                })
                .collect();
            (name.to_owned(), serde_json::Value::Array(events))
        })
        .collect();

    let report = json!({
        "beatmap": file.beatmap.full_name(),
        "skipping": plan.skipping,
        "initial_progress_ms": plan.initial_progress_ms,
        "start_point_ms": plan.start_point_ms,
        "intro_end_ms": plan.intro_end_ms,
        "warning": plan.warning.map(|w| json!({ "start_ms": w.start_ms, "duration_ms": w.duration_ms })),
        "overlay_is_score": session.overlay().is_score(),
        "effects": timeline,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Renders a click on every beat of the first timing point, so the boost
/// analysis has transients to find.
fn metronome_track(
    beatmap: &Beatmap,
    config: &AppConfig,
) -> rhythm_playback_core::Result<SimulatedTrack> {
    let sample_rate = config.audio.sample_rate.max(1);
    let length = beatmap.last_object_end_ms()? / 1000.0 + TRACK_TAIL_SECONDS;
    let mut samples = vec![0.0_f32; (length * f64::from(sample_rate)) as usize];

    let beat = beatmap
        .timing_points
        .iter()
        .find(|point| point.beat_length_ms > 0.0)
        .map(|point| (point.time_ms / 1000.0, point.beat_length_ms / 1000.0));

    if let Some((anchor, beat_seconds)) = beat {
        let click_len = (CLICK_SECONDS * sample_rate as f32) as usize;
        let mut onset = anchor;
        while onset < length {
            let first = (onset.max(0.0) * f64::from(sample_rate)) as usize;
            for (i, sample) in samples.iter_mut().skip(first).take(click_len).enumerate() {
                let t = i as f32 / sample_rate as f32;
                *sample = (TAU * CLICK_HZ * t).sin() * (1.0 - t / CLICK_SECONDS);
            }
            onset += beat_seconds;
        }
    }

    SimulatedTrack::analyse(&samples, sample_rate, config.audio.block_size)
}

/// Headless renderer that logs a frame summary now and then.
#[derive(Debug, Default)]
struct TracingRenderer {
    frames: u64,
}

impl Renderer for TracingRenderer {
    fn draw(&mut self, frame: &FrameSnapshot) -> rhythm_playback_core::Result<()> {
        if self.frames % LOG_EVERY == 0 {
            let broken = frame.broken.iter().filter(|broken| **broken).count();
            tracing::info!(
                progress_ms = frame.progress_ms,
                started = frame.has_started,
                background = frame.background_alpha,
                cursor = frame.cursor_alpha,
                overlay = frame.overlay_alpha,
                beat_phase = frame.beat_phase,
                beat_scale = frame.beat_scale,
                mirrors = frame.gameplay_cameras.len(),
                broken,
                draw_fps = frame.draw_fps,
                update_fps = frame.update_fps,
                "frame"
            );
        }
        self.frames += 1;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless beatmap replay playback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a session on a synthesized track and log frame summaries.
    Play {
        /// JSON file with the beatmap and replays.
        session: PathBuf,
        /// Optional JSON configuration; missing values use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Wall-clock seconds to run before exiting.
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,
        #[arg(long, default_value_t = 1920.0)]
        width: f32,
        #[arg(long, default_value_t = 1080.0)]
        height: f32,
        /// Run without a track; the clock falls back to wall time.
        #[arg(long)]
        silent: bool,
    },
    /// Print the start plan and the scheduled fades of a session.
    Inspect {
        /// JSON file with the beatmap and replays.
        session: PathBuf,
        /// Optional JSON configuration; missing values use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
