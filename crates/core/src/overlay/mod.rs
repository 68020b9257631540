//! Gameplay overlay chosen once per session.

use crate::{
    config::SessionMode,
    knockout::KnockoutOverlay,
    replay::{HitResult, ReplaySource},
    shared::SharedState,
    Result,
};

/// Running score of the single watched player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreOverlay {
    combo: i64,
    max_combo: i64,
    counts: [u32; 4],
    last_hit: HitResult,
}

impl ScoreOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, now_ms: i64, source: &dyn ReplaySource) {
        self.combo = source.combo_at(0, now_ms);
        self.max_combo = self.max_combo.max(self.combo);
    }

    pub fn on_hit(&mut self, player: usize, result: HitResult) {
        if player != 0 {
            return;
        }
        self.counts[result as usize] += 1;
        self.last_hit = result;
    }

    pub fn combo(&self) -> i64 {
        self.combo
    }

    pub fn max_combo(&self) -> i64 {
        self.max_combo
    }

    pub fn count(&self, result: HitResult) -> u32 {
        self.counts[result as usize]
    }

    pub fn last_hit(&self) -> HitResult {
        self.last_hit
    }

    /// Share of the maximum judgement value, 300 for a perfect hit.
    pub fn accuracy(&self) -> f64 {
        let total: u32 = self.counts.iter().sum();
        if total == 0 {
            return 1.0;
        }
        let points = 300 * self.count(HitResult::Hit300)
            + 100 * self.count(HitResult::Hit100)
            + 50 * self.count(HitResult::Hit50);
        f64::from(points) / (300.0 * f64::from(total))
    }
}

#[derive(Debug, Clone)]
pub enum Overlay {
    Score(ScoreOverlay),
    Knockout(KnockoutOverlay),
    None,
}

impl Overlay {
    /// Picks the overlay for a session. A knockout with a single replay has
    /// nobody to compete with and shows the score instead.
    pub fn select(mode: SessionMode, replays: &dyn ReplaySource, row_height: f64) -> Self {
        match mode {
            SessionMode::Play => Overlay::Score(ScoreOverlay::new()),
            SessionMode::Knockout if replays.player_count() <= 1 => {
                Overlay::Score(ScoreOverlay::new())
            }
            SessionMode::Knockout => Overlay::Knockout(KnockoutOverlay::new(replays, row_height)),
            SessionMode::Watch => Overlay::None,
        }
    }

    pub fn is_score(&self) -> bool {
        matches!(self, Overlay::Score(_))
    }

    pub fn update(&mut self, now_ms: i64, source: &dyn ReplaySource) -> Result<()> {
        match self {
            Overlay::Score(score) => score.update(now_ms, source),
            Overlay::Knockout(knockout) => knockout.update(now_ms, source)?,
            Overlay::None => {}
        }
        Ok(())
    }

    pub fn on_hit(&mut self, player: usize, time_ms: i64, result: HitResult) -> Result<()> {
        match self {
            Overlay::Score(score) => score.on_hit(player, result),
            Overlay::Knockout(knockout) => knockout.on_hit(player, time_ms, result)?,
            Overlay::None => {}
        }
        Ok(())
    }

    /// Only the knockout overlay eliminates players.
    pub fn is_broken(&self, player: usize) -> bool {
        match self {
            Overlay::Knockout(knockout) => knockout.is_broken(player),
            _ => false,
        }
    }

    pub fn publish(&self, shared: &SharedState) {
        match self {
            Overlay::Knockout(knockout) => knockout.publish(shared),
            Overlay::Score(score) => {
                if let Some(player) = shared.player(0) {
                    player.set_last_hit(score.last_hit());
                }
            }
            Overlay::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ComboSample, ReplayData, ReplaySet};

    fn replays(count: usize) -> ReplaySet {
        ReplaySet::new(
            (0..count)
                .map(|i| ReplayData {
                    name: format!("player {i}"),
                    mods: String::new(),
                    combo: vec![
                        ComboSample { time_ms: 0, combo: 5 },
                        ComboSample { time_ms: 100, combo: 0 },
                    ],
                    cursor: Vec::new(),
                    hits: Vec::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn selection_follows_mode_and_player_count() {
        let one = replays(1);
        let many = replays(3);

        assert!(Overlay::select(SessionMode::Play, &many, 20.0).is_score());
        assert!(Overlay::select(SessionMode::Knockout, &one, 20.0).is_score());
        assert!(matches!(
            Overlay::select(SessionMode::Knockout, &many, 20.0),
            Overlay::Knockout(ref k) if k.player_count() == 3
        ));
        assert!(matches!(Overlay::select(SessionMode::Watch, &many, 20.0), Overlay::None));
    }

    #[test]
    fn score_overlay_tracks_combo_and_judgements() {
        let set = replays(1);
        let mut overlay = Overlay::select(SessionMode::Play, &set, 20.0);

        overlay.update(50, &set).unwrap();
        overlay.on_hit(0, 50, HitResult::Hit300).unwrap();
        overlay.on_hit(0, 60, HitResult::Hit100).unwrap();
        overlay.on_hit(1, 60, HitResult::Miss).unwrap();
        overlay.update(150, &set).unwrap();

        let Overlay::Score(score) = &overlay else {
            panic!("expected score overlay");
        };
        assert_eq!(score.combo(), 0);
        assert_eq!(score.max_combo(), 5);
        assert_eq!(score.count(HitResult::Hit300), 1);
        assert_eq!(score.count(HitResult::Miss), 0);
        assert_eq!(score.last_hit(), HitResult::Hit100);
        assert!((score.accuracy() - 400.0 / 600.0).abs() < 1e-12);
        assert!(!overlay.is_broken(0));
    }

    #[test]
    fn knockout_variant_forwards_breaks() {
        let set = replays(2);
        let mut overlay = Overlay::select(SessionMode::Knockout, &set, 20.0);
        let shared = SharedState::new(2);

        overlay.update(0, &set).unwrap();
        overlay.update(200, &set).unwrap();
        overlay.publish(&shared);

        assert!(overlay.is_broken(0) && overlay.is_broken(1));
        assert_eq!(shared.broken_flags(), vec![true, true]);
    }
}
