use serde::{Deserialize, Serialize};

use crate::{PlaybackError, Result};

/// Time span of one hit object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitObjectSpan {
    pub start_ms: f64,
    pub end_ms: f64,
}

/// Gap between hit objects during which gameplay visuals relax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakPeriod {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl BreakPeriod {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// A timing point. Points with a non-positive beat length inherit the tempo
/// of the previous one and only change effects such as kiai.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub time_ms: f64,
    pub beat_length_ms: f64,
    #[serde(default)]
    pub kiai: bool,
}

/// The parts of a beatmap the playback core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beatmap {
    pub artist: String,
    pub title: String,
    pub version: String,
    #[serde(default = "default_approach_rate")]
    pub approach_rate: f64,
    pub hit_objects: Vec<HitObjectSpan>,
    #[serde(default)]
    pub breaks: Vec<BreakPeriod>,
    pub timing_points: Vec<TimingPoint>,
}

fn default_approach_rate() -> f64 {
    5.0
}

impl Beatmap {
    pub fn full_name(&self) -> String {
        format!("{} - {} [{}]", self.artist, self.title, self.version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hit_objects.is_empty() {
            return Err(PlaybackError::EmptyBeatmap);
        }
        if self
            .hit_objects
            .iter()
            .any(|object| !object.start_ms.is_finite() || object.end_ms < object.start_ms)
        {
            return Err(PlaybackError::InvalidInput("hit object ends before it starts"));
        }
        Ok(())
    }

    pub fn first_object_ms(&self) -> Result<f64> {
        self.hit_objects
            .iter()
            .map(|object| object.start_ms)
            .reduce(f64::min)
            .ok_or(PlaybackError::EmptyBeatmap)
    }

    pub fn last_object_end_ms(&self) -> Result<f64> {
        self.hit_objects
            .iter()
            .map(|object| object.end_ms)
            .reduce(f64::max)
            .ok_or(PlaybackError::EmptyBeatmap)
    }

    pub fn preempt_ms(&self) -> f64 {
        preempt_for(self.approach_rate)
    }

    pub fn timing(&self) -> TimingPoints {
        TimingPoints::new(self.timing_points.clone())
    }
}

/// Time between a hit object appearing and needing to be hit.
pub fn preempt_for(approach_rate: f64) -> f64 {
    if approach_rate < 5.0 {
        1200.0 + 600.0 * (5.0 - approach_rate) / 5.0
    } else {
        1200.0 - 750.0 * (approach_rate - 5.0) / 5.0
    }
}

/// Tempo in effect at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    pub beat_length_ms: f64,
    /// Time of the timing point that set the beat length.
    pub anchor_ms: f64,
    pub kiai: bool,
}

/// Anything that can report the current tempo once per update tick.
pub trait TimingSource {
    fn sample_at(&mut self, time_ms: f64) -> Option<TimingSample>;
}

/// Timing points resolved into per-point samples, queried with a cursor that
/// favours monotonically increasing times.
#[derive(Debug, Clone)]
pub struct TimingPoints {
    times: Vec<f64>,
    samples: Vec<TimingSample>,
    cursor: usize,
}

impl TimingPoints {
    pub fn new(mut points: Vec<TimingPoint>) -> Self {
        points.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));

        let mut tempo = (0.0, 0.0);
        let samples = points
            .iter()
            .map(|point| {
                if point.beat_length_ms > 0.0 {
                    tempo = (point.beat_length_ms, point.time_ms);
                }
                TimingSample {
                    beat_length_ms: tempo.0,
                    anchor_ms: tempo.1,
                    kiai: point.kiai,
                }
            })
            .collect();

        Self {
            times: points.iter().map(|point| point.time_ms).collect(),
            samples,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl TimingSource for TimingPoints {
    /// Returns the latest point at or before `time_ms`, or the first point
    /// for times before it.
    fn sample_at(&mut self, time_ms: f64) -> Option<TimingSample> {
        if self.samples.is_empty() {
            return None;
        }

        if self.times[self.cursor] > time_ms {
            self.cursor = self.times.partition_point(|t| *t <= time_ms).saturating_sub(1);
        } else {
            while self.cursor + 1 < self.times.len() && self.times[self.cursor + 1] <= time_ms {
                self.cursor += 1;
            }
        }

        Some(self.samples[self.cursor])
    }
}
