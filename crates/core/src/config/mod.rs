use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{pulse::PulseMode, Result};

/// Top-level configuration structure for the application.
///
/// Every section falls back to its defaults, so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub playfield: PlayfieldConfig,
    pub audio: AudioConfig,
    pub cursor: CursorConfig,
    pub performance: PerformanceConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// How replays are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Watch cursors without a gameplay overlay.
    #[default]
    Watch,
    /// Single player with a score overlay.
    Play,
    /// Several replays competing until their combo breaks.
    Knockout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub mode: SessionMode,
    /// Jump straight to the first hit object.
    pub skip: bool,
    /// Start position in seconds; values below 10ms are ignored.
    pub scrub_seconds: f64,
    pub speed: f64,
    pub pitch: f64,
    pub audio_offset_ms: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Watch,
            skip: false,
            scrub_seconds: 0.0,
            speed: 1.0,
            pitch: 1.0,
            audio_offset_ms: 0.0,
        }
    }
}

/// Intro, gameplay and break values for a faded layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseValues {
    pub intro: f64,
    pub normal: f64,
    pub breaks: f64,
}

impl PhaseValues {
    pub const fn new(intro: f64, normal: f64, breaks: f64) -> Self {
        Self {
            intro,
            normal,
            breaks,
        }
    }
}

impl Default for PhaseValues {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeizureWarningConfig {
    pub enabled: bool,
    pub duration_seconds: f64,
}

impl Default for SeizureWarningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayfieldConfig {
    /// Pause before the intro fades finish, in seconds.
    pub lead_in_hold: f64,
    /// Extra time before the session starts, in seconds.
    pub lead_in_time: f64,
    pub fade_out_time: f64,
    pub background_dim: PhaseValues,
    pub background_blur: PhaseValues,
    pub logo_dim: PhaseValues,
    /// Multiply the background alpha by the beat scale.
    pub flash_to_the_beat: bool,
    pub seizure_warning: SeizureWarningConfig,
    /// Number of rotated copies drawn around the screen center.
    pub divides: usize,
    pub scale: f64,
}

impl Default for PlayfieldConfig {
    fn default() -> Self {
        Self {
            lead_in_hold: 2.0,
            lead_in_time: 5.0,
            fade_out_time: 5.0,
            background_dim: PhaseValues::new(0.0, 0.95, 0.5),
            background_blur: PhaseValues::new(0.0, 0.6, 0.3),
            logo_dim: PhaseValues::new(0.0, 1.0, 0.5),
            flash_to_the_beat: false,
            seizure_warning: SeizureWarningConfig::default(),
            divides: 1,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub beat_scale: f64,
    /// Lock the pulse to timing points instead of following the audio boost.
    pub beat_use_timing_points: bool,
    pub sample_rate: u32,
    pub block_size: usize,
}

impl AudioConfig {
    pub fn pulse_mode(&self) -> PulseMode {
        if self.beat_use_timing_points {
            PulseMode::TimingPoints
        } else {
            PulseMode::Boost
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            beat_scale: 1.2,
            beat_use_timing_points: false,
            sample_rate: 48_000,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub show_on_breaks: bool,
    pub scale_to_the_beat: bool,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            show_on_breaks: true,
            scale_to_the_beat: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub base_update_rate: u32,
    pub max_update_rate: u32,
    /// Period of the audio-feature loop.
    pub pulse_period_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            base_update_rate: 2000,
            max_update_rate: 10_000,
            pulse_period_ms: 15,
        }
    }
}
