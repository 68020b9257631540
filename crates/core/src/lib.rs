//! Core library for rhythm-game replay playback.
//!
//! A session is simulated on an update thread that owns the playback clock,
//! the beat tracker, every animation glider and the gameplay overlay. An
//! audio-feature thread turns track levels into the beat pulse, and the render
//! loop reads both through [`SharedState`] without taking locks.

pub mod analysis;
pub mod audio;
pub mod beat;
pub mod beatmap;
pub mod camera;
pub mod config;
pub mod effects;
pub mod error;
pub mod glider;
pub mod knockout;
pub mod overlay;
pub mod pacer;
pub mod pulse;
pub mod render;
pub mod replay;
pub mod session;
pub mod shared;
pub mod timeline;

pub use glam;

pub use analysis::{AnalysisEngine, AnalysisFrame, AnalysisSummary};
pub use audio::{AudioState, AudioTrack, SimulatedTrack};
pub use beat::BeatPhaseTracker;
pub use beatmap::{Beatmap, TimingPoints, TimingSample, TimingSource};
pub use camera::{Camera, CameraTransform, MirrorCameraSet};
pub use config::{AppConfig, SessionMode};
pub use effects::SessionEffects;
pub use error::{PlaybackError, Result};
pub use glider::{Easing, Glider, GliderEvent};
pub use knockout::KnockoutOverlay;
pub use overlay::{Overlay, ScoreOverlay};
pub use pacer::{FrameCounter, PacerHandle, UpdatePacer};
pub use pulse::{AudioFeatureSmoother, PulseMode};
pub use render::{FrameSnapshot, RenderDriver, Renderer};
pub use replay::{HitResult, ReplayData, ReplaySet, ReplaySource};
pub use session::{spawn_pulse_loop, spawn_update_loop, Session};
pub use shared::SharedState;
pub use timeline::{PlaybackClock, StartParams, StartPlan};
