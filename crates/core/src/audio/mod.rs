use std::{
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
    time::Instant,
};

use crate::{
    analysis::{sample_frames, AnalysisEngine, AnalysisFrame},
    shared::AtomicF64,
    Result,
};

/// Playback state reported by an audio backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AudioState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl AudioState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AudioState::Playing,
            2 => AudioState::Paused,
            _ => AudioState::Stopped,
        }
    }
}

/// Narrow view of the audio engine that the playback core drives.
///
/// Implementations are shared between the update loop (position, transport)
/// and the audio-feature loop (levels), so every method takes `&self`.
pub trait AudioTrack: Send + Sync {
    /// Current playback position in seconds.
    fn position(&self) -> f64;
    fn state(&self) -> AudioState;
    fn play(&self);
    fn set_position(&self, seconds: f64);
    fn set_tempo(&self, tempo: f64);
    fn set_pitch(&self, pitch: f64);
    /// Combined instantaneous level of all channels.
    fn level_combined(&self) -> f64;
    /// Transient low-frequency boost in [0, 1].
    fn boost(&self) -> f64;
    fn set_volume_relative(&self, volume: f64);
    /// Track length in seconds.
    fn length(&self) -> f64;

    /// Refreshes backend-side state. Called from the audio-feature loop.
    fn update(&self) {}
}

/// Wall-clock driven track that replays pre-analysed level data.
///
/// Position is derived from an anchor (position, instant) pair that is moved
/// on every transport change; the pair is written by the update loop only.
#[derive(Debug)]
pub struct SimulatedTrack {
    epoch: Instant,
    anchor_nanos: AtomicU64,
    anchor_position: AtomicF64,
    state: AtomicU8,
    tempo: AtomicF64,
    pitch: AtomicF64,
    volume: AtomicF64,
    length: f64,
    frames: Vec<AnalysisFrame>,
}

impl SimulatedTrack {
    /// Creates a silent track of the given length.
    pub fn new(length_seconds: f64) -> Self {
        Self::with_frames(length_seconds, Vec::new())
    }

    /// Creates a track whose levels come from previously analysed frames.
    pub fn with_frames(length_seconds: f64, frames: Vec<AnalysisFrame>) -> Self {
        Self {
            epoch: Instant::now(),
            anchor_nanos: AtomicU64::new(0),
            anchor_position: AtomicF64::new(0.0),
            state: AtomicU8::new(AudioState::Stopped as u8),
            tempo: AtomicF64::new(1.0),
            pitch: AtomicF64::new(1.0),
            volume: AtomicF64::new(1.0),
            length: length_seconds.max(0.0),
            frames,
        }
    }

    /// Analyses mono `samples` and wraps the result in a track.
    pub fn analyse(samples: &[f32], sample_rate: u32, block_size: usize) -> Result<Self> {
        let mut engine = AnalysisEngine::with_sample_rate(sample_rate);
        engine.analyse(samples, block_size)?;
        let length = samples.len() as f64 / f64::from(sample_rate.max(1));

        tracing::debug!(
            frames = engine.frames().len(),
            length,
            peak = engine.summary().peak_level,
            "analysed track"
        );

        Ok(Self::with_frames(length, engine.take_frames()))
    }

    pub fn tempo(&self) -> f64 {
        self.tempo.load()
    }

    pub fn pitch(&self) -> f64 {
        self.pitch.load()
    }

    pub fn volume(&self) -> f64 {
        self.volume.load()
    }

    pub fn pause(&self) {
        if self.state() == AudioState::Playing {
            self.reanchor(self.position());
            self.state.store(AudioState::Paused as u8, Ordering::Release);
        }
    }

    fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn reanchor(&self, position: f64) {
        self.anchor_position.store(position);
        self.anchor_nanos.store(self.elapsed_nanos(), Ordering::Release);
    }

    fn current_frame(&self) -> AnalysisFrame {
        sample_frames(&self.frames, self.position() as f32)
    }
}

impl AudioTrack for SimulatedTrack {
    fn position(&self) -> f64 {
        let anchor = self.anchor_position.load();
        if self.state() != AudioState::Playing {
            return anchor;
        }

        let since = self
            .elapsed_nanos()
            .saturating_sub(self.anchor_nanos.load(Ordering::Acquire));
        (anchor + since as f64 / 1e9 * self.tempo.load()).min(self.length)
    }

    fn state(&self) -> AudioState {
        AudioState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn play(&self) {
        let position = self.position();
        self.reanchor(position);
        self.state.store(AudioState::Playing as u8, Ordering::Release);
    }

    fn set_position(&self, seconds: f64) {
        self.reanchor(seconds.clamp(0.0, self.length));
    }

    fn set_tempo(&self, tempo: f64) {
        self.reanchor(self.position());
        self.tempo.store(tempo.max(0.0));
    }

    fn set_pitch(&self, pitch: f64) {
        self.pitch.store(pitch);
    }

    fn level_combined(&self) -> f64 {
        if self.state() != AudioState::Playing {
            return 0.0;
        }
        f64::from(self.current_frame().level) * self.volume.load()
    }

    fn boost(&self) -> f64 {
        if self.state() != AudioState::Playing {
            return 0.0;
        }
        f64::from(self.current_frame().boost)
    }

    fn set_volume_relative(&self, volume: f64) {
        self.volume.store(volume.clamp(0.0, 1.0));
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn update(&self) {
        if self.state() == AudioState::Playing && self.position() >= self.length {
            self.reanchor(self.length);
            self.state.store(AudioState::Stopped as u8, Ordering::Release);
            tracing::info!(length = self.length, "track finished");
        }
    }
}

/// Scripted track for deterministic tests: position only moves when told to.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    use super::{AudioState, AudioTrack};
    use crate::shared::AtomicF64;

    #[derive(Debug, Default)]
    pub struct ScriptedTrack {
        pub position: AtomicF64,
        state: AtomicU8,
        pub play_calls: AtomicUsize,
        pub set_position_calls: AtomicUsize,
        pub last_set_position: AtomicF64,
        pub tempo: AtomicF64,
        pub pitch: AtomicF64,
        pub level: AtomicF64,
        pub boost: AtomicF64,
        pub volume: AtomicF64,
    }

    impl ScriptedTrack {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_state(&self, state: AudioState) {
            self.state.store(state as u8, Ordering::Release);
        }

        pub fn plays(&self) -> usize {
            self.play_calls.load(Ordering::Acquire)
        }

        pub fn seeks(&self) -> usize {
            self.set_position_calls.load(Ordering::Acquire)
        }
    }

    impl AudioTrack for ScriptedTrack {
        fn position(&self) -> f64 {
            self.position.load()
        }

        fn state(&self) -> AudioState {
            AudioState::from_u8(self.state.load(Ordering::Acquire))
        }

        fn play(&self) {
            self.play_calls.fetch_add(1, Ordering::AcqRel);
            self.set_state(AudioState::Playing);
        }

        fn set_position(&self, seconds: f64) {
            self.set_position_calls.fetch_add(1, Ordering::AcqRel);
            self.last_set_position.store(seconds);
            self.position.store(seconds);
        }

        fn set_tempo(&self, tempo: f64) {
            self.tempo.store(tempo);
        }

        fn set_pitch(&self, pitch: f64) {
            self.pitch.store(pitch);
        }

        fn level_combined(&self) -> f64 {
            self.level.load()
        }

        fn boost(&self) -> f64 {
            self.boost.load()
        }

        fn set_volume_relative(&self, volume: f64) {
            self.volume.store(volume);
        }

        fn length(&self) -> f64 {
            f64::MAX
        }
    }
}
