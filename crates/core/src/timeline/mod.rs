use crate::audio::{AudioState, AudioTrack};

/// Skip, scrub and lead-in inputs for [`StartPlan::compute`]. All times are
/// in milliseconds of beatmap time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StartParams {
    /// Time of the first hit object when skipping the intro is requested.
    pub skip_target_ms: Option<f64>,
    pub scrub_target_ms: f64,
    pub preempt_ms: f64,
    pub lead_in_hold_ms: f64,
    /// Requested seizure warning duration; shown for at least a second.
    pub warning_ms: Option<f64>,
    pub lead_in_time_ms: f64,
}

/// Window in which the seizure warning is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarningWindow {
    pub start_ms: f64,
    pub duration_ms: f64,
}

/// Where a session starts and when audio begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPlan {
    /// True when the intro is skipped or scrubbed past.
    pub skipping: bool,
    pub skip_target_ms: f64,
    /// Audio position (ms) at which the track starts playing.
    pub start_point_ms: f64,
    /// Moment the intro fades finish.
    pub intro_end_ms: f64,
    pub warning: Option<WarningWindow>,
    /// Clock value before the first tick.
    pub initial_progress_ms: f64,
}

impl StartPlan {
    /// Scrubs shorter than this are treated as no scrub at all.
    const MIN_SCRUB_MS: f64 = 10.0;
    const MIN_WARNING_MS: f64 = 1000.0;

    pub fn compute(params: &StartParams) -> Self {
        let scrub = params.scrub_target_ms.max(0.0);
        let skipping = params.skip_target_ms.is_some() || scrub > Self::MIN_SCRUB_MS;
        let skip_target_ms = params.skip_target_ms.unwrap_or(0.0).max(scrub);

        let (start_point_ms, mut offset) = if skipping {
            (skip_target_ms - params.preempt_ms, skip_target_ms)
        } else {
            (0.0, 0.0)
        };

        offset -= params.lead_in_hold_ms + params.preempt_ms;
        let intro_end_ms = offset;

        let warning = params.warning_ms.map(|requested| {
            let duration_ms = requested.max(Self::MIN_WARNING_MS);
            offset -= duration_ms;
            WarningWindow {
                start_ms: offset,
                duration_ms,
            }
        });

        offset -= params.lead_in_time_ms;

        Self {
            skipping,
            skip_target_ms,
            start_point_ms,
            intro_end_ms,
            warning,
            initial_progress_ms: offset,
        }
    }
}

/// Authoritative playback progress, reconciled from the audio engine when it
/// is running and from accumulated wall-clock deltas otherwise.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    progress_ms: f64,
    start_point_ms: f64,
    tempo: f64,
    pitch: f64,
    audio_offset_ms: f64,
    has_started: bool,
    audio_synced: bool,
}

impl PlaybackClock {
    pub fn new(plan: &StartPlan) -> Self {
        Self {
            progress_ms: plan.initial_progress_ms,
            start_point_ms: plan.start_point_ms,
            tempo: 1.0,
            pitch: 1.0,
            audio_offset_ms: 0.0,
            has_started: false,
            audio_synced: false,
        }
    }

    pub fn with_rate(mut self, tempo: f64, pitch: f64) -> Self {
        self.tempo = tempo;
        self.pitch = pitch;
        self
    }

    pub fn with_audio_offset(mut self, offset_ms: f64) -> Self {
        self.audio_offset_ms = offset_ms;
        self
    }

    pub fn progress_ms(&self) -> f64 {
        self.progress_ms
    }

    pub fn start_point_ms(&self) -> f64 {
        self.start_point_ms
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// Advances the clock by one update tick of `dt_ms` wall-clock time.
    ///
    /// Returns `true` on the single tick where playback begins.
    pub fn advance(&mut self, dt_ms: f64, track: Option<&dyn AudioTrack>) -> bool {
        match track {
            None => {
                let rate = if self.has_started { self.tempo } else { 1.0 };
                self.progress_ms += dt_ms * rate;
            }
            Some(track) if track.state() == AudioState::Stopped => {
                self.progress_ms += dt_ms;
            }
            Some(track) => {
                let audio_ms = track.position() * 1000.0 + self.audio_offset_ms;
                if self.audio_synced {
                    self.progress_ms = self.progress_ms.max(audio_ms);
                } else {
                    tracing::debug!(
                        from = self.progress_ms,
                        to = audio_ms,
                        "clock handed over to audio"
                    );
                    self.progress_ms = audio_ms;
                    self.audio_synced = true;
                }
            }
        }

        if self.has_started || self.progress_ms < self.start_point_ms {
            return false;
        }

        match track {
            Some(track) => {
                track.play();
                track.set_tempo(self.tempo);
                track.set_pitch(self.pitch);
                track.set_position(self.start_point_ms / 1000.0);
            }
            None => tracing::warn!("no audio track, playback continues on the wall clock"),
        }

        self.has_started = true;
        tracing::info!(
            progress = self.progress_ms,
            start_point = self.start_point_ms,
            tempo = self.tempo,
            "playback started"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::ScriptedTrack;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn plan_without_skip_starts_one_preempt_early() {
        let plan = StartPlan::compute(&StartParams {
            preempt_ms: 600.0,
            ..Default::default()
        });

        assert!(!plan.skipping);
        assert!(approx(plan.initial_progress_ms, -600.0));
        assert!(approx(plan.start_point_ms, 0.0));
        assert!(approx(plan.intro_end_ms, -600.0));
    }

    #[test]
    fn plan_with_skip_offsets_from_the_larger_target() {
        let plan = StartPlan::compute(&StartParams {
            skip_target_ms: Some(5000.0),
            scrub_target_ms: 3000.0,
            preempt_ms: 600.0,
            lead_in_hold_ms: 200.0,
            ..Default::default()
        });

        assert!(plan.skipping);
        assert!(approx(plan.skip_target_ms, 5000.0));
        assert!(approx(plan.start_point_ms, 4400.0));
        assert!(approx(plan.initial_progress_ms, 4200.0));

        let scrubbed = StartPlan::compute(&StartParams {
            skip_target_ms: Some(5000.0),
            scrub_target_ms: 8000.0,
            preempt_ms: 600.0,
            ..Default::default()
        });
        assert!(approx(scrubbed.start_point_ms, 7400.0));
    }

    #[test]
    fn warning_and_lead_in_extend_the_intro() {
        let plan = StartPlan::compute(&StartParams {
            preempt_ms: 600.0,
            warning_ms: Some(300.0),
            lead_in_time_ms: 1000.0,
            ..Default::default()
        });

        let warning = plan.warning.unwrap();
        assert!(approx(warning.duration_ms, 1000.0));
        assert!(approx(warning.start_ms, -1600.0));
        assert!(approx(plan.initial_progress_ms, -2600.0));
    }

    #[test]
    fn starts_audio_exactly_once_after_preempt() {
        let plan = StartPlan::compute(&StartParams {
            preempt_ms: 600.0,
            ..Default::default()
        });
        let mut clock = PlaybackClock::new(&plan).with_rate(1.5, 1.0);
        let track = ScriptedTrack::new();
        assert!(approx(clock.progress_ms(), -600.0));

        for _ in 0..5 {
            assert!(!clock.advance(100.0, Some(&track)));
        }
        assert!(!clock.has_started());
        assert!(clock.advance(100.0, Some(&track)));
        assert!(clock.has_started());

        track.position.store(0.2);
        for _ in 0..10 {
            assert!(!clock.advance(16.0, Some(&track)));
        }

        assert_eq!(track.plays(), 1);
        assert_eq!(track.seeks(), 1);
        assert!(approx(track.last_set_position.load(), 0.0));
        assert!(approx(track.tempo.load(), 1.5));
    }

    #[test]
    fn skip_seeks_audio_to_the_start_point() {
        let plan = StartPlan::compute(&StartParams {
            skip_target_ms: Some(5000.0),
            preempt_ms: 600.0,
            lead_in_time_ms: 600.0,
            ..Default::default()
        });
        let mut clock = PlaybackClock::new(&plan);
        let track = ScriptedTrack::new();
        assert!(approx(clock.progress_ms(), 3800.0));

        assert!(!clock.advance(300.0, Some(&track)));
        assert!(clock.advance(300.0, Some(&track)));
        assert!(!clock.advance(300.0, Some(&track)));

        assert_eq!(track.plays(), 1);
        assert_eq!(track.seeks(), 1);
        assert!(approx(track.last_set_position.load(), 4.4));
    }

    #[test]
    fn skip_without_lead_in_starts_on_the_first_tick() {
        let plan = StartPlan::compute(&StartParams {
            skip_target_ms: Some(5000.0),
            preempt_ms: 600.0,
            ..Default::default()
        });
        assert!(approx(plan.start_point_ms, 4400.0));
        assert!(approx(plan.initial_progress_ms, 4400.0));

        let mut clock = PlaybackClock::new(&plan);
        let track = ScriptedTrack::new();
        assert!(approx(clock.progress_ms(), 4400.0));

        assert!(clock.advance(16.0, Some(&track)));
        assert!(!clock.advance(16.0, Some(&track)));

        assert_eq!(track.plays(), 1);
        assert_eq!(track.seeks(), 1);
        assert!(approx(track.last_set_position.load(), 4.4));
    }

    #[test]
    fn audio_position_drives_progress_and_never_rewinds() {
        let plan = StartPlan::compute(&StartParams::default());
        let mut clock = PlaybackClock::new(&plan).with_audio_offset(-20.0);
        let track = ScriptedTrack::new();
        clock.advance(5.0, Some(&track));

        track.position.store(5.0);
        clock.advance(1000.0, Some(&track));
        assert!(approx(clock.progress_ms(), 4980.0));

        track.position.store(4.99);
        clock.advance(1.0, Some(&track));
        assert!(approx(clock.progress_ms(), 4980.0));

        track.position.store(5.5);
        clock.advance(1.0, Some(&track));
        assert!(approx(clock.progress_ms(), 5480.0));
    }

    #[test]
    fn paused_audio_holds_progress() {
        let plan = StartPlan::compute(&StartParams::default());
        let mut clock = PlaybackClock::new(&plan);
        let track = ScriptedTrack::new();
        clock.advance(1.0, Some(&track));
        track.position.store(2.0);
        track.set_state(AudioState::Paused);

        clock.advance(500.0, Some(&track));
        clock.advance(500.0, Some(&track));
        assert!(approx(clock.progress_ms(), 2000.0));
    }

    #[test]
    fn falls_back_to_wall_clock_without_audio() {
        let plan = StartPlan::compute(&StartParams {
            preempt_ms: 100.0,
            ..Default::default()
        });
        let mut clock = PlaybackClock::new(&plan).with_rate(2.0, 1.0);

        assert!(clock.advance(100.0, None));
        assert!(approx(clock.progress_ms(), 0.0));
        clock.advance(100.0, None);
        assert!(approx(clock.progress_ms(), 200.0));
    }
}
