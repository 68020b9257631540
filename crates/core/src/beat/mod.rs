//! Continuous beat counter derived from the current timing point.

/// Tracks the beat index and fractional phase for the playback clock.
///
/// The index advances by at most one beat per [`BeatPhaseTracker::advance`]
/// call, so a large seek is followed by a short catch-up instead of a visible
/// jump in anything driven by the phase.
#[derive(Debug, Clone, Default)]
pub struct BeatPhaseTracker {
    beat_length_ms: f64,
    anchor_ms: f64,
    beat_index: i64,
    beat_phase: f64,
}

impl BeatPhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beat_length_ms(&self) -> f64 {
        self.beat_length_ms
    }

    pub fn anchor_ms(&self) -> f64 {
        self.anchor_ms
    }

    pub fn beat_index(&self) -> i64 {
        self.beat_index
    }

    /// Fractional position within the current beat.
    pub fn beat_phase(&self) -> f64 {
        self.beat_phase
    }

    /// Feeds the tempo active at `progress_ms`. A changed beat length
    /// re-anchors the counter one beat early so the next advance lands on the
    /// correct index.
    pub fn on_tempo_sample(&mut self, beat_length_ms: f64, anchor_ms: f64, progress_ms: f64) {
        if !is_trackable(beat_length_ms) || beat_length_ms == self.beat_length_ms {
            return;
        }

        self.beat_length_ms = beat_length_ms;
        self.anchor_ms = anchor_ms;
        self.beat_index = beats_since(progress_ms, anchor_ms, beat_length_ms) - 1;

        tracing::debug!(
            beat_length_ms,
            anchor_ms,
            beat_index = self.beat_index,
            "beat tracker re-anchored"
        );
    }

    pub fn advance(&mut self, progress_ms: f64) {
        if !is_trackable(self.beat_length_ms) {
            return;
        }

        if beats_since(progress_ms, self.anchor_ms, self.beat_length_ms) > self.beat_index {
            self.beat_index += 1;
        }

        self.beat_phase =
            (progress_ms - self.anchor_ms) / self.beat_length_ms - self.beat_index as f64;
    }
}

fn is_trackable(beat_length_ms: f64) -> bool {
    beat_length_ms.is_finite() && beat_length_ms > 0.0
}

fn beats_since(progress_ms: f64, anchor_ms: f64, beat_length_ms: f64) -> i64 {
    ((progress_ms - anchor_ms) / beat_length_ms).floor() as i64
}
