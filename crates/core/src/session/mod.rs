//! The update tick and the background loops that drive a playback session.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    process,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use glam::Vec2;

use crate::{
    audio::AudioTrack,
    beat::BeatPhaseTracker,
    beatmap::{Beatmap, TimingPoints, TimingSource},
    camera::Camera,
    config::AppConfig,
    effects::{start_params, SessionEffects},
    knockout::KnockoutOverlay,
    overlay::Overlay,
    pacer::{FrameCounter, UpdatePacer},
    pulse::AudioFeatureSmoother,
    replay::{ReplaySet, ReplaySource},
    shared::SharedState,
    timeline::{PlaybackClock, StartPlan},
    Result,
};

/// Simulation state owned by the update thread.
pub struct Session {
    plan: StartPlan,
    clock: PlaybackClock,
    beat: BeatPhaseTracker,
    timing: TimingPoints,
    effects: SessionEffects,
    overlay: Overlay,
    replays: ReplaySet,
    track: Option<Arc<dyn AudioTrack>>,
    shared: Arc<SharedState>,
    camera: Camera,
    hits_scanned_to: Option<i64>,
    profiler: FrameCounter,
}

impl Session {
    pub fn new(
        beatmap: &Beatmap,
        replays: ReplaySet,
        config: &AppConfig,
        track: Option<Arc<dyn AudioTrack>>,
        viewport: Vec2,
    ) -> Result<Self> {
        beatmap.validate()?;

        let plan = StartPlan::compute(&start_params(beatmap, config)?);
        let overlay = Overlay::select(
            config.playback.mode,
            &replays,
            KnockoutOverlay::row_height_for(f64::from(viewport.y)),
        );
        let effects = SessionEffects::schedule(beatmap, config, &plan, overlay.is_score())?;
        let clock = PlaybackClock::new(&plan)
            .with_rate(config.playback.speed, config.playback.pitch)
            .with_audio_offset(config.playback.audio_offset_ms);

        let mut camera = Camera::new();
        camera.set_playfield_viewport(viewport.x, viewport.y, config.playfield.scale as f32);
        camera.update();

        tracing::info!(
            beatmap = %beatmap.full_name(),
            players = replays.player_count(),
            mode = ?config.playback.mode,
            initial_progress_ms = plan.initial_progress_ms,
            start_point_ms = plan.start_point_ms,
            "session created"
        );

        Ok(Self {
            plan,
            clock,
            beat: BeatPhaseTracker::new(),
            timing: beatmap.timing(),
            effects,
            overlay,
            shared: Arc::new(SharedState::new(replays.player_count())),
            replays,
            track,
            camera,
            hits_scanned_to: None,
            profiler: FrameCounter::new(),
        })
    }

    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn track(&self) -> Option<Arc<dyn AudioTrack>> {
        self.track.clone()
    }

    pub fn plan(&self) -> &StartPlan {
        &self.plan
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn beat(&self) -> &BeatPhaseTracker {
        &self.beat
    }

    pub fn effects(&self) -> &SessionEffects {
        &self.effects
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// One update step after `dt_ms` of wall-clock time.
    pub fn tick(&mut self, dt_ms: f64) -> Result<()> {
        if dt_ms > 0.0 {
            self.profiler.put_sample(dt_ms);
        }

        if self.clock.advance(dt_ms, self.track.as_deref()) {
            self.shared.set_has_started(true);
        }
        let progress = self.clock.progress_ms();
        let now_ms = progress.floor() as i64;

        self.dispatch_hits(now_ms)?;
        self.overlay.update(now_ms, &self.replays)?;

        if let Some(sample) = self.timing.sample_at(progress) {
            self.beat
                .on_tempo_sample(sample.beat_length_ms, sample.anchor_ms, progress);
            self.shared.set_kiai(sample.kiai);
        }
        self.beat.advance(progress);

        self.effects.update(progress);
        let offset = self.background_offset(now_ms) * self.effects.cursor.value() as f32;
        if let Some(track) = &self.track {
            track.set_volume_relative(self.effects.volume.value());
        }

        self.shared.progress_ms.store(progress);
        self.shared.beat_phase.store(self.beat.beat_phase());
        self.shared.update_fps.store(self.profiler.fps());
        self.shared.background_x.store(f64::from(offset.x));
        self.shared.background_y.store(f64::from(offset.y));
        self.effects.publish(&self.shared);
        self.overlay.publish(&self.shared);
        Ok(())
    }

    /// Mean cursor position in device coordinates; the background leans
    /// towards where the players are.
    fn background_offset(&self, now_ms: i64) -> Vec2 {
        let count = self.replays.player_count();
        if count == 0 {
            return Vec2::ZERO;
        }
        let sum: Vec2 = (0..count)
            .map(|player| self.camera.project_ndc(self.replays.cursor_at(player, now_ms)))
            .sum();
        sum / count as f32
    }

    /// Forwards replay judgements in `(last scan, now_ms]` to the overlay.
    fn dispatch_hits(&mut self, now_ms: i64) -> Result<()> {
        let after = match self.hits_scanned_to {
            Some(last) if now_ms > last => last,
            Some(last) if now_ms == last => return Ok(()),
            _ => {
                self.hits_scanned_to = Some(now_ms);
                return Ok(());
            }
        };

        for player in 0..self.replays.player_count() {
            for hit in self.replays.hits_between(player, after, now_ms) {
                self.overlay.on_hit(player, hit.time_ms, hit.result)?;
            }
        }
        self.hits_scanned_to = Some(now_ms);
        Ok(())
    }
}

/// Runs [`Session::tick`] on its own thread, paced by `pacer`.
///
/// The loop never returns. A failed tick or a panic is logged and terminates
/// the process with exit code 1.
pub fn spawn_update_loop(session: Session, pacer: UpdatePacer) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("update".into())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_update_loop(session, pacer)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "update loop failed");
                    process::exit(1);
                }
                Err(payload) => {
                    tracing::error!(panic = panic_message(&*payload), "update loop panicked");
                    process::exit(1);
                }
            }
        })?;
    Ok(handle)
}

fn run_update_loop(mut session: Session, mut pacer: UpdatePacer) -> Result<()> {
    tracing::debug!(target_rate = pacer.target(), "update loop started");
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        session.tick((now - last).as_secs_f64() * 1000.0)?;
        last = now;
        pacer.sync();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Samples the track and publishes the smoothed beat scale.
pub fn pulse_step(
    track: Option<&dyn AudioTrack>,
    smoother: &mut AudioFeatureSmoother,
    shared: &SharedState,
) -> f64 {
    let (level, boost) = match track {
        Some(track) => {
            track.update();
            (track.level_combined(), track.boost())
        }
        None => (0.0, 0.0),
    };

    let scale = smoother.tick(level, boost, shared.beat_phase.load());
    shared.scale.store(scale);
    shared.pulse.store(smoother.pulse());
    scale
}

/// Runs [`pulse_step`] every `period` on its own thread.
pub fn spawn_pulse_loop(
    track: Option<Arc<dyn AudioTrack>>,
    shared: Arc<SharedState>,
    mut smoother: AudioFeatureSmoother,
    period: Duration,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new().name("pulse".into()).spawn(move || {
        tracing::debug!(period_ms = period.as_millis() as u64, mode = ?smoother.mode(), "pulse loop started");
        loop {
            pulse_step(track.as_deref(), &mut smoother, &shared);
            thread::sleep(period);
        }
    })?;
    Ok(handle)
}
