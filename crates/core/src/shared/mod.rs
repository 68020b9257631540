//! Scalars published by one loop and read by the others.
//!
//! Every field has exactly one writer. Readers may observe a value that is a
//! frame stale, which is tolerated; nothing here ever blocks.

use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
};

use crate::replay::HitResult;

pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.load().fmt(f)
    }
}

/// Per-player overlay values written by the update loop.
#[derive(Debug, Default)]
pub struct PublishedPlayer {
    pub broken: AtomicBool,
    pub alpha: AtomicF64,
    pub height: AtomicF64,
    pub hit_alpha: AtomicF64,
    pub hit_scale: AtomicF64,
    last_hit: AtomicU8,
    pub death_alpha: AtomicF64,
    pub death_x: AtomicF64,
    pub death_y: AtomicF64,
}

impl PublishedPlayer {
    pub fn last_hit(&self) -> HitResult {
        HitResult::from_u8(self.last_hit.load(Ordering::Acquire))
    }

    pub fn set_last_hit(&self, result: HitResult) {
        self.last_hit.store(result as u8, Ordering::Release);
    }
}

/// State shared between the update, audio-feature and render loops.
#[derive(Debug)]
pub struct SharedState {
    // Update loop.
    pub progress_ms: AtomicF64,
    pub has_started: AtomicBool,
    pub beat_phase: AtomicF64,
    pub kiai: AtomicBool,
    pub update_fps: AtomicF64,
    pub dim: AtomicF64,
    pub blur: AtomicF64,
    pub fx: AtomicF64,
    pub cursor_alpha: AtomicF64,
    pub players_alpha: AtomicF64,
    pub hud_alpha: AtomicF64,
    pub warning_alpha: AtomicF64,
    pub volume: AtomicF64,
    /// Background parallax in normalised device coordinates.
    pub background_x: AtomicF64,
    pub background_y: AtomicF64,
    players: Box<[PublishedPlayer]>,

    // Audio-feature loop.
    pub scale: AtomicF64,
    pub pulse: AtomicF64,
}

impl SharedState {
    pub fn new(player_count: usize) -> Self {
        Self {
            progress_ms: AtomicF64::default(),
            has_started: AtomicBool::new(false),
            beat_phase: AtomicF64::default(),
            kiai: AtomicBool::new(false),
            update_fps: AtomicF64::default(),
            dim: AtomicF64::default(),
            blur: AtomicF64::default(),
            fx: AtomicF64::default(),
            cursor_alpha: AtomicF64::default(),
            players_alpha: AtomicF64::default(),
            hud_alpha: AtomicF64::new(1.0),
            warning_alpha: AtomicF64::default(),
            volume: AtomicF64::new(1.0),
            background_x: AtomicF64::default(),
            background_y: AtomicF64::default(),
            players: (0..player_count).map(|_| PublishedPlayer::default()).collect(),
            scale: AtomicF64::new(1.0),
            pulse: AtomicF64::default(),
        }
    }

    pub fn players(&self) -> &[PublishedPlayer] {
        &self.players
    }

    pub fn player(&self, index: usize) -> Option<&PublishedPlayer> {
        self.players.get(index)
    }

    pub fn set_has_started(&self, started: bool) {
        self.has_started.store(started, Ordering::Release);
    }

    pub fn has_started(&self) -> bool {
        self.has_started.load(Ordering::Acquire)
    }

    pub fn set_kiai(&self, kiai: bool) {
        self.kiai.store(kiai, Ordering::Release);
    }

    pub fn kiai(&self) -> bool {
        self.kiai.load(Ordering::Acquire)
    }

    /// Broken flags in player order, for cursor suppression.
    pub fn broken_flags(&self) -> Vec<bool> {
        self.players
            .iter()
            .map(|player| player.broken.load(Ordering::Acquire))
            .collect()
    }
}
