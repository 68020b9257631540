//! Beat pulsation derived from audio level, boost and beat phase.

use serde::{Deserialize, Serialize};

/// Default period of the audio-feature loop.
pub const DEFAULT_TICK_MS: f64 = 15.0;
/// Period the smoothing ratio is normalised against (one 60Hz frame).
const REFERENCE_PERIOD_MS: f64 = 1000.0 / 60.0;
const AVERAGE_WEIGHT: f64 = 0.1;
const LEVEL_SPAN: f64 = 0.5;
const BOOST_WEIGHT: f64 = 0.666;
const BOOST_STEP: f64 = 0.15;

/// Source of the beat scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseMode {
    /// Scale follows the smoothed pulse, which is locked to timing points.
    #[default]
    TimingPoints,
    /// Scale eases towards a target derived from the audio boost.
    Boost,
}

/// Low-pass filters audio features into the beat scale used by rendering.
#[derive(Debug, Clone)]
pub struct AudioFeatureSmoother {
    mode: PulseMode,
    beat_scale: f64,
    ratio: f64,
    level_average: f64,
    pulse: f64,
    scale: f64,
}

impl AudioFeatureSmoother {
    pub fn new(mode: PulseMode, beat_scale: f64) -> Self {
        Self::with_tick(mode, beat_scale, DEFAULT_TICK_MS)
    }

    pub fn with_tick(mode: PulseMode, beat_scale: f64, tick_ms: f64) -> Self {
        Self {
            mode,
            beat_scale: beat_scale.max(1.0),
            ratio: 0.5_f64.powf(tick_ms.max(0.0) / REFERENCE_PERIOD_MS),
            level_average: 0.0,
            pulse: 0.0,
            scale: 1.0,
        }
    }

    pub fn mode(&self) -> PulseMode {
        self.mode
    }

    /// Smoothed pulse in [0, 1].
    pub fn pulse(&self) -> f64 {
        self.pulse
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn level_average(&self) -> f64 {
        self.level_average
    }

    /// Advances the filters by one tick and returns the new scale.
    pub fn tick(&mut self, level: f64, boost: f64, beat_phase: f64) -> f64 {
        self.level_average =
            self.level_average * (1.0 - AVERAGE_WEIGHT) + level * AVERAGE_WEIGHT;

        let deviation = 1.0 - (level - self.level_average) / LEVEL_SPAN;
        let input = (1.0 - 0.5 * deviation - 0.5 * beat_phase).clamp(0.0, 1.0);
        self.pulse = self.pulse * self.ratio + input * (1.0 - self.ratio);

        match self.mode {
            PulseMode::TimingPoints => {
                self.scale = 1.0 + self.pulse * (self.beat_scale - 1.0);
            }
            PulseMode::Boost => {
                let target = (boost * BOOST_WEIGHT * (self.beat_scale - 1.0) + 1.0)
                    .clamp(1.0, self.beat_scale);
                self.scale += (target - self.scale) * BOOST_STEP;
            }
        }

        self.scale
    }
}
