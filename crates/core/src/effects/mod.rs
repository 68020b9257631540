//! Session-wide fades: background, logo, cursor, players, HUD, volume and the
//! seizure warning.

use crate::{
    beatmap::Beatmap,
    config::AppConfig,
    glider::{Glider, GliderEvent},
    shared::SharedState,
    timeline::{StartParams, StartPlan},
    Result,
};

const INTRO_FADE_MS: f64 = 500.0;
/// Gameplay values are reached this long before the first object...
const NORMAL_FADE_LEAD_MS: f64 = 750.0;
/// ...and fully in place this long before it.
const NORMAL_FADE_SETTLE_MS: f64 = 250.0;
const BREAK_FADE_MS: f64 = 500.0;
const BREAK_CURSOR_FADE_MS: f64 = 100.0;
/// Breaks shorter than this keep gameplay visuals.
const MIN_BREAK_MS: f64 = 1000.0;
/// Hit object fade-in time, reused for the volume ramp after a skip.
const HIT_FADE_IN_MS: f64 = 400.0;
const WARNING_FADE_MS: f64 = 500.0;

/// Start inputs derived from the beatmap and configuration.
pub fn start_params(beatmap: &Beatmap, config: &AppConfig) -> Result<StartParams> {
    let playfield = &config.playfield;
    Ok(StartParams {
        skip_target_ms: config
            .playback
            .skip
            .then(|| beatmap.first_object_ms())
            .transpose()?,
        scrub_target_ms: config.playback.scrub_seconds * 1000.0,
        preempt_ms: beatmap.preempt_ms(),
        lead_in_hold_ms: playfield.lead_in_hold * 1000.0,
        warning_ms: playfield
            .seizure_warning
            .enabled
            .then_some(playfield.seizure_warning.duration_seconds * 1000.0),
        lead_in_time_ms: playfield.lead_in_time * 1000.0,
    })
}

/// Gliders evaluated every update tick at the playback progress.
///
/// `dim` holds the background alpha, so a configured dim of 0.95 becomes 0.05.
#[derive(Debug, Clone)]
pub struct SessionEffects {
    pub dim: Glider,
    pub blur: Glider,
    pub fx: Glider,
    pub cursor: Glider,
    pub players: Glider,
    pub hud: Glider,
    pub volume: Glider,
    pub warning: Glider,
}

impl SessionEffects {
    /// Schedules every fade of a session. With a score overlay the cursor is
    /// visible from the start instead of fading in with the first object.
    pub fn schedule(
        beatmap: &Beatmap,
        config: &AppConfig,
        plan: &StartPlan,
        cursor_visible_at_start: bool,
    ) -> Result<Self> {
        let playfield = &config.playfield;
        let (dim, blur, logo) = (
            playfield.background_dim,
            playfield.background_blur,
            playfield.logo_dim,
        );

        let mut effects = Self {
            dim: Glider::new(0.0),
            blur: Glider::new(0.0),
            fx: Glider::new(0.0),
            cursor: Glider::new(if cursor_visible_at_start { 1.0 } else { 0.0 }),
            players: Glider::new(0.0),
            hud: Glider::new(1.0),
            volume: Glider::new(1.0),
            warning: Glider::new(0.0),
        };

        if plan.skipping {
            effects.volume.set_value(0.0);
            effects
                .volume
                .add_event(plan.start_point_ms, plan.start_point_ms + HIT_FADE_IN_MS, 1.0)?;
        }

        let intro = (plan.intro_end_ms - INTRO_FADE_MS, plan.intro_end_ms);
        effects.dim.add_event(intro.0, intro.1, 1.0 - dim.intro)?;
        effects.blur.add_event(intro.0, intro.1, blur.intro)?;
        effects.fx.add_event(intro.0, intro.1, 1.0 - logo.intro)?;
        if !cursor_visible_at_start {
            effects.cursor.add_event(intro.0, intro.1, 0.0)?;
        }
        effects.players.add_event(intro.0, intro.1, 1.0)?;

        let first = beatmap
            .first_object_ms()?
            .max(config.playback.scrub_seconds * 1000.0);
        let normal = (first - NORMAL_FADE_LEAD_MS, first - NORMAL_FADE_SETTLE_MS);
        effects.dim.add_event(normal.0, normal.1, 1.0 - dim.normal)?;
        effects.blur.add_event(normal.0, normal.1, blur.normal)?;
        effects.fx.add_event(normal.0, normal.1, 1.0 - logo.normal)?;
        effects.cursor.add_event(normal.0, normal.1, 1.0)?;

        let last = beatmap.last_object_end_ms()?;
        let outro = (last, last + (playfield.fade_out_time * 1000.0).max(1.0));
        for glider in [
            &mut effects.dim,
            &mut effects.fx,
            &mut effects.cursor,
            &mut effects.players,
            &mut effects.hud,
            &mut effects.volume,
        ] {
            glider.add_event(outro.0, outro.1, 0.0)?;
        }

        if let Some(warning) = plan.warning {
            let start = warning.start_ms;
            let end = start + warning.duration_ms;
            effects.warning.add_event(start, start + WARNING_FADE_MS, 1.0)?;
            effects.warning.add_event(end - WARNING_FADE_MS, end, 0.0)?;
        }

        for pause in beatmap
            .breaks
            .iter()
            .filter(|pause| pause.duration_ms() >= MIN_BREAK_MS)
        {
            let enter = (pause.start_ms, pause.start_ms + BREAK_FADE_MS);
            let leave = (pause.end_ms - BREAK_FADE_MS, pause.end_ms);

            effects.dim.add_event(enter.0, enter.1, 1.0 - dim.breaks)?;
            effects.blur.add_event(enter.0, enter.1, blur.breaks)?;
            effects.fx.add_event(enter.0, enter.1, 1.0 - logo.breaks)?;
            if !config.cursor.show_on_breaks {
                effects
                    .cursor
                    .add_event(pause.start_ms, pause.start_ms + BREAK_CURSOR_FADE_MS, 0.0)?;
            }

            effects.dim.add_event(leave.0, leave.1, 1.0 - dim.normal)?;
            effects.blur.add_event(leave.0, leave.1, blur.normal)?;
            effects.fx.add_event(leave.0, leave.1, 1.0 - logo.normal)?;
            effects
                .cursor
                .add_event(pause.end_ms - BREAK_CURSOR_FADE_MS, pause.end_ms, 1.0)?;
        }

        tracing::debug!(
            intro_end_ms = plan.intro_end_ms,
            first_object_ms = first,
            last_object_ms = last,
            breaks = beatmap.breaks.len(),
            "session effects scheduled"
        );

        Ok(effects)
    }

    pub fn update(&mut self, time: f64) {
        for glider in self.gliders_mut() {
            glider.update(time);
        }
    }

    /// Named event lists, for printing a session timeline.
    pub fn timeline(&self) -> Vec<(&'static str, &[GliderEvent])> {
        vec![
            ("dim", self.dim.events()),
            ("blur", self.blur.events()),
            ("fx", self.fx.events()),
            ("cursor", self.cursor.events()),
            ("players", self.players.events()),
            ("hud", self.hud.events()),
            ("volume", self.volume.events()),
            ("warning", self.warning.events()),
        ]
    }

    pub fn publish(&self, shared: &SharedState) {
        shared.dim.store(self.dim.value());
        shared.blur.store(self.blur.value());
        shared.fx.store(self.fx.value());
        shared.cursor_alpha.store(self.cursor.value());
        shared.players_alpha.store(self.players.value());
        shared.hud_alpha.store(self.hud.value());
        shared.volume.store(self.volume.value());
        shared.warning_alpha.store(self.warning.value());
    }

    fn gliders_mut(&mut self) -> [&mut Glider; 8] {
        [
            &mut self.dim,
            &mut self.blur,
            &mut self.fx,
            &mut self.cursor,
            &mut self.players,
            &mut self.hud,
            &mut self.volume,
            &mut self.warning,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::{BreakPeriod, HitObjectSpan, TimingPoint};

    fn beatmap() -> Beatmap {
        Beatmap {
            artist: "A".into(),
            title: "T".into(),
            version: "V".into(),
            approach_rate: 9.0,
            hit_objects: vec![
                HitObjectSpan {
                    start_ms: 2000.0,
                    end_ms: 2000.0,
                },
                HitObjectSpan {
                    start_ms: 9000.0,
                    end_ms: 10_000.0,
                },
            ],
            breaks: vec![
                BreakPeriod {
                    start_ms: 4000.0,
                    end_ms: 6000.0,
                },
                BreakPeriod {
                    start_ms: 7000.0,
                    end_ms: 7800.0,
                },
            ],
            timing_points: vec![TimingPoint {
                time_ms: 0.0,
                beat_length_ms: 500.0,
                kiai: false,
            }],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn schedule(config: &AppConfig, score: bool) -> (StartPlan, SessionEffects) {
        let map = beatmap();
        let plan = StartPlan::compute(&start_params(&map, config).unwrap());
        let effects = SessionEffects::schedule(&map, config, &plan, score).unwrap();
        (plan, effects)
    }

    #[test]
    fn intro_normal_and_outro_fades() {
        let (plan, effects) = schedule(&AppConfig::default(), false);
        assert_eq!(plan.intro_end_ms, -2600.0);
        assert_eq!(plan.initial_progress_ms, -7600.0);

        let dim = &effects.dim;
        assert!(approx(dim.value_at(-8000.0), 0.0));
        assert!(approx(dim.value_at(-2850.0), 0.5));
        assert!(approx(dim.value_at(-2600.0), 1.0));
        assert!(approx(dim.value_at(1500.0), 0.525));
        assert!(approx(dim.value_at(1750.0), 0.05));
        assert!(approx(dim.value_at(12_500.0), 0.025));

        assert!(approx(effects.players.value_at(-2600.0), 1.0));
        assert!(approx(effects.hud.value_at(12_500.0), 0.5));
        assert!(approx(effects.volume.value_at(0.0), 1.0));
        assert!(approx(effects.volume.value_at(15_000.0), 0.0));
        assert!(approx(effects.cursor.value_at(1750.0), 1.0));
    }

    #[test]
    fn long_breaks_relax_the_background() {
        let (_, effects) = schedule(&AppConfig::default(), false);
        let dim = &effects.dim;

        assert!(approx(dim.value_at(4250.0), 0.275));
        assert!(approx(dim.value_at(5000.0), 0.5));
        assert!(approx(dim.value_at(6000.0), 0.05));
        // Short breaks keep gameplay visuals.
        assert!(approx(dim.value_at(7400.0), 0.05));
        assert!(approx(effects.cursor.value_at(5000.0), 1.0));
    }

    #[test]
    fn cursor_hides_on_breaks_when_configured() {
        let mut config = AppConfig::default();
        config.cursor.show_on_breaks = false;
        let (_, effects) = schedule(&config, false);

        assert!(approx(effects.cursor.value_at(4050.0), 0.5));
        assert!(approx(effects.cursor.value_at(5000.0), 0.0));
        assert!(approx(effects.cursor.value_at(5950.0), 0.5));
        assert!(approx(effects.cursor.value_at(6000.0), 1.0));
    }

    #[test]
    fn score_overlay_keeps_cursor_visible_through_the_intro() {
        let (_, hidden) = schedule(&AppConfig::default(), false);
        let (_, shown) = schedule(&AppConfig::default(), true);

        assert!(approx(hidden.cursor.value_at(-3000.0), 0.0));
        assert!(approx(shown.cursor.value_at(-3000.0), 1.0));
    }

    #[test]
    fn skipping_ramps_the_volume_from_the_start_point() {
        let mut config = AppConfig::default();
        config.playback.skip = true;
        let (plan, effects) = schedule(&config, false);

        assert_eq!(plan.start_point_ms, 1400.0);
        assert!(approx(effects.volume.value_at(1000.0), 0.0));
        assert!(approx(effects.volume.value_at(1600.0), 0.5));
        assert!(approx(effects.volume.value_at(1800.0), 1.0));
    }

    #[test]
    fn seizure_warning_fades_in_and_out() {
        let mut config = AppConfig::default();
        config.playfield.seizure_warning.enabled = true;
        config.playfield.seizure_warning.duration_seconds = 2.0;
        let (plan, mut effects) = schedule(&config, false);

        let warning = plan.warning.unwrap();
        assert_eq!(warning.start_ms, -4600.0);
        assert!(approx(effects.warning.value_at(-4350.0), 0.5));
        assert!(approx(effects.warning.value_at(-3500.0), 1.0));
        assert!(approx(effects.warning.value_at(-2850.0), 0.5));

        let shared = SharedState::new(0);
        effects.update(-3500.0);
        effects.publish(&shared);
        assert!(approx(shared.warning_alpha.load(), 1.0));
        assert_eq!(effects.timeline().len(), 8);
    }
}
