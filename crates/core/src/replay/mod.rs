use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::PLAYFIELD_SIZE;

/// Judgement of a single hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HitResult {
    #[default]
    Hit300 = 0,
    Hit100 = 1,
    Hit50 = 2,
    Miss = 3,
}

impl HitResult {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HitResult::Hit100,
            2 => HitResult::Hit50,
            3 => HitResult::Miss,
            _ => HitResult::Hit300,
        }
    }

    pub fn is_perfect(self) -> bool {
        self == HitResult::Hit300
    }
}

/// Per-player replay data as seen by overlays.
pub trait ReplaySource {
    fn player_count(&self) -> usize;
    fn name(&self, player: usize) -> &str;
    /// Combo the player holds at `time_ms`.
    fn combo_at(&self, player: usize, time_ms: i64) -> i64;
    /// Cursor position in playfield coordinates at `time_ms`.
    fn cursor_at(&self, player: usize, time_ms: i64) -> Vec2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboSample {
    pub time_ms: i64,
    pub combo: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorSample {
    pub time_ms: i64,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitEvent {
    pub time_ms: i64,
    pub result: HitResult,
}

/// One recorded play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayData {
    pub name: String,
    #[serde(default)]
    pub mods: String,
    pub combo: Vec<ComboSample>,
    #[serde(default)]
    pub cursor: Vec<CursorSample>,
    #[serde(default)]
    pub hits: Vec<HitEvent>,
}

/// Replays sorted for time-based lookup.
#[derive(Debug, Clone, Default)]
pub struct ReplaySet {
    replays: Vec<ReplayData>,
}

impl ReplaySet {
    pub fn new(mut replays: Vec<ReplayData>) -> Self {
        for replay in &mut replays {
            replay.combo.sort_by_key(|sample| sample.time_ms);
            replay.cursor.sort_by_key(|sample| sample.time_ms);
            replay.hits.sort_by_key(|hit| hit.time_ms);
        }
        Self { replays }
    }

    pub fn replays(&self) -> &[ReplayData] {
        &self.replays
    }

    /// Hits judged in `(after_ms, until_ms]`.
    pub fn hits_between(&self, player: usize, after_ms: i64, until_ms: i64) -> &[HitEvent] {
        let Some(replay) = self.replays.get(player) else {
            return &[];
        };
        let from = replay.hits.partition_point(|hit| hit.time_ms <= after_ms);
        let to = replay.hits.partition_point(|hit| hit.time_ms <= until_ms);
        &replay.hits[from..to.max(from)]
    }
}

impl ReplaySource for ReplaySet {
    fn player_count(&self) -> usize {
        self.replays.len()
    }

    fn name(&self, player: usize) -> &str {
        self.replays
            .get(player)
            .map(|replay| replay.name.as_str())
            .unwrap_or_default()
    }

    fn combo_at(&self, player: usize, time_ms: i64) -> i64 {
        let Some(replay) = self.replays.get(player) else {
            return 0;
        };
        let index = replay.combo.partition_point(|sample| sample.time_ms <= time_ms);
        index
            .checked_sub(1)
            .map(|i| replay.combo[i].combo)
            .unwrap_or(0)
    }

    fn cursor_at(&self, player: usize, time_ms: i64) -> Vec2 {
        let Some(samples) = self.replays.get(player).map(|replay| &replay.cursor) else {
            return PLAYFIELD_SIZE / 2.0;
        };
        let index = samples.partition_point(|sample| sample.time_ms <= time_ms);

        match (index.checked_sub(1).map(|i| samples[i]), samples.get(index)) {
            (Some(a), Some(b)) => {
                let span = (b.time_ms - a.time_ms) as f32;
                let t = if span > 0.0 {
                    (time_ms - a.time_ms) as f32 / span
                } else {
                    0.0
                };
                Vec2::new(a.x, a.y).lerp(Vec2::new(b.x, b.y), t)
            }
            (Some(a), None) => Vec2::new(a.x, a.y),
            (None, Some(b)) => Vec2::new(b.x, b.y),
            (None, None) => PLAYFIELD_SIZE / 2.0,
        }
    }
}
