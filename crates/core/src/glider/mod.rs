//! Time-windowed value interpolation.
//!
//! A [`Glider`] owns a timeline of animation events and produces a single
//! scalar for any queried timestamp. Events may overlap; the one that started
//! most recently owns the output, and its end value is held once it finishes
//! until a later event starts. A short transient pulse therefore cuts off a
//! longer base animation for good.

use serde::{Deserialize, Serialize};

use crate::{PlaybackError, Result};

/// Easing curve applied to the normalised progress of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    OutCubic,
    OutCirc,
}

impl Easing {
    /// Maps `t` in [0, 1] onto the curve. Inputs outside the range are clamped.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => -t * (t - 2.0),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -2.0 * t * t + 4.0 * t - 1.0
                }
            }
            Easing::OutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::OutCirc => {
                let u = t - 1.0;
                (1.0 - u * u).sqrt()
            }
        }
    }
}

/// A single scheduled animation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GliderEvent {
    pub start: f64,
    pub end: f64,
    pub start_value: f64,
    pub end_value: f64,
    pub easing: Easing,
}

impl GliderEvent {
    fn sample(&self, time: f64) -> f64 {
        let progress = (time - self.start) / (self.end - self.start);
        self.start_value + (self.end_value - self.start_value) * self.easing.apply(progress)
    }
}

/// Animated scalar driven by a timeline of [`GliderEvent`]s.
#[derive(Debug, Clone)]
pub struct Glider {
    events: Vec<GliderEvent>,
    resting: f64,
    value: f64,
    easing: Easing,
    /// Count of events whose start is at or before `last_time`.
    cursor: usize,
    last_time: Option<f64>,
}

impl Glider {
    /// Creates a glider resting at `value` with no events.
    pub fn new(value: f64) -> Self {
        Self {
            events: Vec::new(),
            resting: value,
            value,
            easing: Easing::Linear,
            cursor: 0,
            last_time: None,
        }
    }

    /// Value computed by the most recent [`Glider::update`].
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overrides the resting value used before the first event starts.
    pub fn set_value(&mut self, value: f64) {
        self.resting = value;
        self.value = value;
    }

    /// Easing applied to events added after this call.
    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    pub fn events(&self) -> &[GliderEvent] {
        &self.events
    }

    /// Animates from the value the timeline will have at `start` towards
    /// `target`.
    pub fn add_event(&mut self, start: f64, end: f64, target: f64) -> Result<()> {
        check_window(start, end)?;
        let start_value = self.value_at(start);
        self.insert(GliderEvent {
            start,
            end,
            start_value,
            end_value: target,
            easing: self.easing,
        });
        Ok(())
    }

    /// Animates between two explicit endpoints.
    pub fn add_event_with_bounds(
        &mut self,
        start: f64,
        end: f64,
        start_value: f64,
        end_value: f64,
    ) -> Result<()> {
        check_window(start, end)?;
        self.insert(GliderEvent {
            start,
            end,
            start_value,
            end_value,
            easing: self.easing,
        });
        Ok(())
    }

    /// Drops every event. The current value becomes the resting value.
    pub fn reset(&mut self) {
        self.events.clear();
        self.resting = self.value;
        self.cursor = 0;
        self.last_time = None;
    }

    /// Evaluates the timeline at `time` and caches the result.
    pub fn update(&mut self, time: f64) -> f64 {
        let started = match self.last_time {
            Some(last) if time >= last => {
                while self.cursor < self.events.len() && self.events[self.cursor].start <= time {
                    self.cursor += 1;
                }
                self.cursor
            }
            _ => self.events.partition_point(|event| event.start <= time),
        };

        self.cursor = started;
        self.last_time = Some(time);
        self.value = self.resolve(started, time);
        self.value
    }

    /// Evaluates the timeline at `time` without touching the cache.
    pub fn value_at(&self, time: f64) -> f64 {
        let started = self.events.partition_point(|event| event.start <= time);
        self.resolve(started, time)
    }

    fn resolve(&self, started: usize, time: f64) -> f64 {
        match started.checked_sub(1).map(|index| &self.events[index]) {
            None => self.resting,
            Some(event) if time >= event.end => event.end_value,
            Some(event) => event.sample(time),
        }
    }

    fn insert(&mut self, event: GliderEvent) {
        let index = self.events.partition_point(|existing| existing.start <= event.start);
        self.events.insert(index, event);

        // Force the next update to re-seek; the cursor may now be stale.
        self.last_time = None;
    }
}

fn check_window(start: f64, end: f64) -> Result<()> {
    if !start.is_finite() || !end.is_finite() || end <= start {
        return Err(PlaybackError::InvalidWindow { start, end });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn returns_initial_value_before_any_event() {
        let mut glider = Glider::new(0.25);
        assert!(approx(glider.update(1000.0), 0.25));

        glider.add_event(500.0, 1000.0, 1.0).unwrap();
        assert!(approx(glider.update(100.0), 0.25));
    }

    #[test]
    fn interpolates_and_holds_after_window() {
        let mut glider = Glider::new(0.0);
        glider.add_event(0.0, 100.0, 1.0).unwrap();

        assert!(approx(glider.update(50.0), 0.5));
        assert!(approx(glider.update(100.0), 1.0));
        assert!(approx(glider.update(400.0), 1.0));
        assert!(approx(glider.update(10_000.0), 1.0));
    }

    #[test]
    fn repeated_queries_are_idempotent() {
        let mut glider = Glider::new(0.0);
        glider.add_event(0.0, 300.0, 3.0).unwrap();

        let first = glider.update(120.0);
        let second = glider.update(120.0);
        assert_eq!(first, second);
        assert!(approx(first, 1.2));
    }

    #[test]
    fn chained_events_start_from_scheduled_value() {
        let mut glider = Glider::new(0.0);
        glider.add_event(-500.0, 0.0, 0.8).unwrap();
        glider.add_event(1000.0, 1500.0, 0.2).unwrap();

        assert!(approx(glider.update(500.0), 0.8));
        assert!(approx(glider.update(1250.0), 0.5));
        assert!(approx(glider.update(2000.0), 0.2));
    }

    #[test]
    fn transient_flash_interrupts_base_fade() {
        let mut glider = Glider::new(1.0);
        glider.add_event(0.0, 3000.0, 0.0).unwrap();
        glider.add_event_with_bounds(1000.0, 1300.0, 0.5, 1.0).unwrap();

        assert!(approx(glider.update(1150.0), 0.75));
        // The base fade was cut off; the flash's end value is held.
        assert!(approx(glider.update(1500.0), 1.0));
        assert!(approx(glider.update(2999.0), 1.0));
        assert!(approx(glider.update(3500.0), 1.0));
        assert!(approx(glider.value_at(500.0), 5.0 / 6.0));
    }

    #[test]
    fn later_event_resumes_from_held_value() {
        let mut glider = Glider::new(0.0);
        glider.add_event(0.0, 1000.0, 1.0).unwrap();
        glider.add_event_with_bounds(200.0, 300.0, 5.0, 6.0).unwrap();
        glider.add_event(600.0, 700.0, 2.0).unwrap();

        assert!(approx(glider.update(400.0), 6.0));
        assert!(approx(glider.update(650.0), 4.0));
        assert!(approx(glider.update(900.0), 2.0));
    }

    #[test]
    fn equal_starts_prefer_later_insertion() {
        let mut glider = Glider::new(0.0);
        glider.add_event_with_bounds(0.0, 100.0, 0.0, 1.0).unwrap();
        glider.add_event_with_bounds(0.0, 100.0, 10.0, 20.0).unwrap();

        assert!(approx(glider.update(50.0), 15.0));
    }

    #[test]
    fn out_of_order_insertion_stays_correct() {
        let mut glider = Glider::new(0.0);
        glider.add_event_with_bounds(200.0, 300.0, 2.0, 3.0).unwrap();
        glider.add_event_with_bounds(0.0, 100.0, 0.0, 1.0).unwrap();

        assert!(approx(glider.update(50.0), 0.5));
        assert!(approx(glider.update(150.0), 1.0));
        assert!(approx(glider.update(250.0), 2.5));
    }

    #[test]
    fn backward_queries_fall_back_to_search() {
        let mut glider = Glider::new(0.0);
        glider.add_event(0.0, 100.0, 1.0).unwrap();
        glider.add_event(200.0, 300.0, 0.0).unwrap();

        assert!(approx(glider.update(250.0), 0.5));
        assert!(approx(glider.update(50.0), 0.5));
        assert!(approx(glider.update(-10.0), 0.0));
        assert!(approx(glider.update(150.0), 1.0));
    }

    #[test]
    fn rejects_degenerate_windows() {
        let mut glider = Glider::new(0.0);
        assert!(matches!(
            glider.add_event(100.0, 100.0, 1.0),
            Err(PlaybackError::InvalidWindow { .. })
        ));
        assert!(glider.add_event_with_bounds(200.0, 100.0, 0.0, 1.0).is_err());
        assert!(glider.add_event(f64::NAN, 100.0, 1.0).is_err());
        assert!(glider.events().is_empty());
    }

    #[test]
    fn reset_keeps_current_value() {
        let mut glider = Glider::new(0.0);
        glider.add_event(0.0, 100.0, 1.0).unwrap();
        glider.update(50.0);

        glider.reset();
        assert!(glider.events().is_empty());
        assert!(approx(glider.update(500.0), 0.5));
    }

    #[test]
    fn easing_applies_to_subsequent_events() {
        let mut glider = Glider::new(0.0);
        glider.set_easing(Easing::OutQuad);
        glider.add_event(0.0, 100.0, 1.0).unwrap();

        assert!(approx(glider.update(50.0), 0.75));
        assert!(approx(glider.update(100.0), 1.0));
    }

    #[test]
    fn easing_curves_hit_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::InQuad,
            Easing::OutQuad,
            Easing::InOutQuad,
            Easing::OutCubic,
            Easing::OutCirc,
        ] {
            assert!(approx(easing.apply(0.0), 0.0), "{easing:?}");
            assert!(approx(easing.apply(1.0), 1.0), "{easing:?}");
        }
    }
}
