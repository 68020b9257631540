//! Knockout overlay: per-player elimination and hit feedback driven by replay
//! combo data.
//!
//! Updates may arrive tens of milliseconds apart, so [`KnockoutOverlay::update`]
//! replays every whole millisecond in between. Comparing only the end points
//! would miss a combo that was broken and rebuilt inside one gap.

use std::sync::atomic::Ordering;

use crate::{
    glider::{Easing, Glider},
    replay::{HitResult, ReplaySource},
    shared::SharedState,
    Result,
};

/// Length of the elimination fade.
pub const ELIMINATION_MS: f64 = 3000.0;
/// Offset into the elimination at which the HUD row starts collapsing.
const COLLAPSE_DELAY_MS: f64 = 2500.0;
/// Distance the name marker drifts down from the point of death.
const DEATH_SLIDE: f64 = 100.0;
const DEATH_FADE_MS: f64 = 200.0;
const HIT_POP_MS: f64 = 300.0;
const HIT_HOLD_MS: f64 = 600.0;
const HIT_FADE_OUT_MS: f64 = 900.0;
/// Marker alpha below which the death marker is not drawn.
const VISIBLE_ALPHA: f64 = 0.01;

#[derive(Debug, Clone)]
struct PlayerState {
    survived: bool,
    combo_at_last_scan: i64,
    eliminated_at: Option<i64>,
    fade: Glider,
    height: Glider,
    death_slide: Glider,
    death_fade: Glider,
    death_x: f64,
    hit_fade: Glider,
    hit_scale: Glider,
    last_hit: HitResult,
}

impl PlayerState {
    fn new(row_height: f64) -> Self {
        let mut death_slide = Glider::new(0.0);
        death_slide.set_easing(Easing::OutCirc);

        Self {
            survived: true,
            combo_at_last_scan: 0,
            eliminated_at: None,
            fade: Glider::new(1.0),
            height: Glider::new(row_height),
            death_slide,
            death_fade: Glider::new(0.0),
            death_x: 0.0,
            hit_fade: Glider::new(0.0),
            hit_scale: Glider::new(0.0),
            last_hit: HitResult::Hit300,
        }
    }

    fn eliminate(&mut self, time_ms: i64, cursor_x: f64, cursor_y: f64) -> Result<()> {
        let at = time_ms as f64;
        self.survived = false;
        self.eliminated_at = Some(time_ms);
        self.death_x = cursor_x;

        self.fade.add_event(at, at + ELIMINATION_MS, 0.0)?;
        self.height.add_event(at + COLLAPSE_DELAY_MS, at + ELIMINATION_MS, 0.0)?;
        self.death_slide
            .add_event_with_bounds(at, at + ELIMINATION_MS, cursor_y, cursor_y + DEATH_SLIDE)?;
        self.death_fade
            .add_event_with_bounds(at, at + DEATH_FADE_MS, 0.0, 1.0)?;
        self.death_fade.add_event_with_bounds(
            at + ELIMINATION_MS - DEATH_FADE_MS,
            at + ELIMINATION_MS,
            1.0,
            0.0,
        )?;
        Ok(())
    }

    fn update(&mut self, time: f64) {
        self.fade.update(time);
        self.height.update(time);
        self.death_slide.update(time);
        self.death_fade.update(time);
        self.hit_fade.update(time);
        self.hit_scale.update(time);
    }
}

/// Death marker drawn where a player's cursor was when they broke combo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathMarker {
    pub x: f64,
    pub y: f64,
    pub alpha: f64,
}

/// Read-only view of one player for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView<'a> {
    pub name: &'a str,
    pub survived: bool,
    pub alpha: f64,
    pub height: f64,
    pub hit_alpha: f64,
    pub hit_scale: f64,
    pub last_hit: HitResult,
    pub death: Option<DeathMarker>,
}

/// Vertical placement of one HUD row. `center_y` grows upward from the
/// bottom edge of the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudRow {
    pub player: usize,
    pub center_y: f64,
    pub height: f64,
}

/// Tracks which replay players are still in the running.
#[derive(Debug, Clone)]
pub struct KnockoutOverlay {
    names: Vec<String>,
    players: Vec<PlayerState>,
    last_processed_ms: Option<i64>,
}

impl KnockoutOverlay {
    pub fn new(source: &dyn ReplaySource, row_height: f64) -> Self {
        let count = source.player_count();
        Self {
            names: (0..count).map(|i| source.name(i).to_owned()).collect(),
            players: (0..count).map(|_| PlayerState::new(row_height)).collect(),
            last_processed_ms: None,
        }
    }

    /// HUD row height that fits 51 rows into 90% of the screen.
    pub fn row_height_for(screen_height: f64) -> f64 {
        screen_height * 0.9 * 1.04 / 51.0
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn last_processed_ms(&self) -> Option<i64> {
        self.last_processed_ms
    }

    /// Scans every millisecond in `(last, now_ms]` for combo breaks and
    /// advances the per-player animations.
    pub fn update(&mut self, now_ms: i64, source: &dyn ReplaySource) -> Result<()> {
        let last = match self.last_processed_ms {
            Some(last) if now_ms > last => last,
            Some(last) if now_ms == last => return Ok(()),
            previous => {
                if previous.is_some() {
                    tracing::debug!(now_ms, ?previous, "knockout overlay rewound");
                }
                self.rebaseline(now_ms, source);
                return Ok(());
            }
        };

        for time in last + 1..=now_ms {
            for (index, player) in self.players.iter_mut().enumerate() {
                let combo = source.combo_at(index, time);
                if player.survived && combo < player.combo_at_last_scan {
                    let cursor = source.cursor_at(index, time);
                    player.eliminate(time, f64::from(cursor.x), f64::from(cursor.y))?;
                    tracing::info!(
                        player = %self.names[index],
                        time,
                        lost_combo = player.combo_at_last_scan,
                        "player knocked out"
                    );
                }
                player.combo_at_last_scan = combo;
                player.update(time as f64);
            }
        }

        self.last_processed_ms = Some(now_ms);
        Ok(())
    }

    /// Ruleset callback: flashes the judgement icon for non-perfect hits.
    pub fn on_hit(&mut self, player: usize, time_ms: i64, result: HitResult) -> Result<()> {
        if result.is_perfect() {
            return Ok(());
        }
        let Some(state) = self.players.get_mut(player) else {
            return Ok(());
        };

        let at = time_ms as f64;
        state.hit_fade.reset();
        state.hit_fade.add_event_with_bounds(at, at + HIT_POP_MS, 0.5, 1.0)?;
        state
            .hit_fade
            .add_event_with_bounds(at + HIT_HOLD_MS, at + HIT_FADE_OUT_MS, 1.0, 0.0)?;
        state.hit_scale.reset();
        state.hit_scale.add_event_with_bounds(at, at + HIT_POP_MS, 0.5, 1.0)?;
        state.last_hit = result;
        Ok(())
    }

    pub fn is_broken(&self, player: usize) -> bool {
        self.players.get(player).is_some_and(|state| !state.survived)
    }

    pub fn eliminated_at(&self, player: usize) -> Option<i64> {
        self.players.get(player).and_then(|state| state.eliminated_at)
    }

    pub fn survivors(&self) -> usize {
        self.players.iter().filter(|state| state.survived).count()
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerView<'_>> {
        self.players
            .iter()
            .zip(&self.names)
            .map(|(state, name)| PlayerView {
                name,
                survived: state.survived,
                alpha: state.fade.value(),
                height: state.height.value(),
                hit_alpha: state.hit_fade.value(),
                hit_scale: state.hit_scale.value(),
                last_hit: state.last_hit,
                death: (state.death_fade.value() >= VISIBLE_ALPHA).then(|| DeathMarker {
                    x: state.death_x,
                    y: state.death_slide.value(),
                    alpha: state.death_fade.value(),
                }),
            })
    }

    /// Rows stacked downward from the top of a block centered on screen;
    /// collapsing rows shrink the block.
    pub fn hud_rows(&self, screen_height: f64) -> Vec<HudRow> {
        let total: f64 = self.players.iter().map(|state| state.height.value()).sum();
        let mut top = screen_height - (screen_height - total) / 2.0;

        self.players
            .iter()
            .enumerate()
            .map(|(player, state)| {
                let height = state.height.value();
                let row = HudRow {
                    player,
                    center_y: top - height / 2.0,
                    height,
                };
                top -= height;
                row
            })
            .collect()
    }

    /// Copies the renderer-facing values into the shared state.
    pub fn publish(&self, shared: &SharedState) {
        for (view, out) in self.players().zip(shared.players()) {
            out.broken.store(!view.survived, Ordering::Release);
            out.alpha.store(view.alpha);
            out.height.store(view.height);
            out.hit_alpha.store(view.hit_alpha);
            out.hit_scale.store(view.hit_scale);
            out.set_last_hit(view.last_hit);
            let death = view.death.unwrap_or(DeathMarker {
                x: 0.0,
                y: 0.0,
                alpha: 0.0,
            });
            out.death_alpha.store(death.alpha);
            out.death_x.store(death.x);
            out.death_y.store(death.y);
        }
    }

    fn rebaseline(&mut self, now_ms: i64, source: &dyn ReplaySource) {
        for (index, player) in self.players.iter_mut().enumerate() {
            player.combo_at_last_scan = source.combo_at(index, now_ms);
            player.update(now_ms as f64);
        }
        self.last_processed_ms = Some(now_ms);
    }
}
