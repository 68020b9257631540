//! Render-side view of a session.
//!
//! The render loop only reads [`SharedState`]; it writes nothing back except
//! the update pacer target.

use std::{sync::Arc, time::Instant};

use glam::Vec2;

use crate::{
    camera::{Camera, MirrorCameraSet},
    config::AppConfig,
    pacer::{FrameCounter, PacerHandle},
    shared::SharedState,
    Result,
};

/// A frame is reported as slow when it takes longer than this while the
/// average rate is still above [`SLOW_FRAME_MIN_FPS`].
const SLOW_FRAME_MS: f64 = 18.0;
const SLOW_FRAME_MIN_FPS: f64 = 58.0;

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub progress_ms: f64,
    pub has_started: bool,
    pub background_alpha: f64,
    pub background_blur: f64,
    pub background_offset: Vec2,
    pub fx_alpha: f64,
    pub cursor_alpha: f64,
    pub cursor_scale: f64,
    /// Players and HUD alpha combined.
    pub overlay_alpha: f64,
    pub warning_alpha: f64,
    pub beat_phase: f64,
    pub beat_scale: f64,
    pub kiai: bool,
    pub gameplay_cameras: MirrorCameraSet,
    pub background_cameras: MirrorCameraSet,
    /// Knocked-out players, whose cursors are not drawn.
    pub broken: Vec<bool>,
    pub draw_fps: f64,
    pub update_fps: f64,
}

/// Drawing backend.
pub trait Renderer {
    fn draw(&mut self, frame: &FrameSnapshot) -> Result<()>;
}

/// Turns published session state into frames on the caller's thread.
pub struct RenderDriver {
    shared: Arc<SharedState>,
    pacer: PacerHandle,
    gameplay: Camera,
    background: Camera,
    divides: usize,
    flash_to_the_beat: bool,
    scale_to_the_beat: bool,
    profiler: FrameCounter,
    last_frame: Option<Instant>,
}

impl RenderDriver {
    pub fn new(
        shared: Arc<SharedState>,
        pacer: PacerHandle,
        config: &AppConfig,
        viewport: Vec2,
    ) -> Self {
        let mut gameplay = Camera::new();
        gameplay.set_playfield_viewport(viewport.x, viewport.y, config.playfield.scale as f32);
        gameplay.update();

        let mut background = Camera::new();
        background.set_playfield_viewport(viewport.x, viewport.y, 1.0);
        background.update();

        Self {
            shared,
            pacer,
            gameplay,
            background,
            divides: config.playfield.divides.max(1),
            flash_to_the_beat: config.playfield.flash_to_the_beat,
            scale_to_the_beat: config.cursor.scale_to_the_beat,
            profiler: FrameCounter::new(),
            last_frame: None,
        }
    }

    pub fn draw_fps(&self) -> f64 {
        self.profiler.fps()
    }

    /// Draws one frame timed against the previous call.
    pub fn frame(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let now = Instant::now();
        let frame_ms = self
            .last_frame
            .map(|last| (now - last).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.frame_after(frame_ms, renderer)
    }

    /// Draws one frame that took `frame_ms` since the last one.
    pub fn frame_after(&mut self, frame_ms: f64, renderer: &mut dyn Renderer) -> Result<()> {
        if frame_ms > 0.0 {
            self.profiler.put_sample(frame_ms);
            let fps = self.profiler.fps();
            let target = self.pacer.set_target_from_draw_rate(fps);

            if fps > SLOW_FRAME_MIN_FPS && frame_ms > SLOW_FRAME_MS {
                tracing::warn!(frame_ms, fps, update_target = target, "slow frame");
            }
        }

        let snapshot = self.snapshot();
        renderer.draw(&snapshot)
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let shared = &self.shared;
        let beat_scale = shared.scale.load();

        let mut background_alpha = shared.dim.load();
        if self.flash_to_the_beat {
            background_alpha *= beat_scale;
        }

        FrameSnapshot {
            progress_ms: shared.progress_ms.load(),
            has_started: shared.has_started(),
            background_alpha,
            background_blur: shared.blur.load(),
            background_offset: Vec2::new(
                shared.background_x.load() as f32,
                shared.background_y.load() as f32,
            ),
            fx_alpha: shared.fx.load(),
            cursor_alpha: shared.cursor_alpha.load(),
            cursor_scale: if self.scale_to_the_beat { beat_scale } else { 1.0 },
            overlay_alpha: shared.players_alpha.load() * shared.hud_alpha.load(),
            warning_alpha: shared.warning_alpha.load(),
            beat_phase: shared.beat_phase.load(),
            beat_scale,
            kiai: shared.kiai(),
            gameplay_cameras: self.gameplay.gen_divided(self.divides),
            background_cameras: self.background.gen_divided(self.divides),
            broken: shared.broken_flags(),
            draw_fps: self.profiler.fps(),
            update_fps: shared.update_fps.load(),
        }
    }
}
