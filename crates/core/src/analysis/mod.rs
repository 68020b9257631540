//! Offline extraction of the level and boost features a track reports to the
//! audio-feature loop.

use std::{f32::consts::TAU, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{PlaybackError, Result};

/// Upper edge of the band whose energy drives the boost feature.
const LOW_BAND_HZ: f32 = 200.0;
/// Rise in low-band share that saturates the boost.
const BOOST_GAIN: f32 = 8.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct AnalysisSummary {
    pub sample_rate: u32,
    pub duration_seconds: f32,
    pub peak_level: f32,
}

/// Audio features of one analysed block, stamped at the block center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub time: f32,
    /// RMS level of the block.
    pub level: f32,
    /// Normalised [0, 1] rise in low-band energy, high on kicks.
    pub boost: f32,
}

/// Windowed FFT of a fixed block size.
struct Spectrum {
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl Spectrum {
    fn new(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        let span = (size.max(2) - 1) as f32;
        Self {
            window: (0..size)
                .map(|i| 0.5 - 0.5 * (TAU * i as f32 / span).cos())
                .collect(),
            input: plan.make_input_vec(),
            output: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        }
    }

    fn size(&self) -> usize {
        self.window.len()
    }

    /// Share of spectral power at or below [`LOW_BAND_HZ`].
    fn low_band_share(&mut self, samples: &[f32], sample_rate: f32) -> Result<f32> {
        for ((slot, sample), weight) in self.input.iter_mut().zip(samples).zip(&self.window) {
            *slot = sample * weight;
        }
        self.plan
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)?;

        let bin_hz = sample_rate / self.size() as f32;
        let low_bins = (LOW_BAND_HZ / bin_hz).floor() as usize + 1;
        let power = |bins: &[Complex32]| bins.iter().map(Complex32::norm_sqr).sum::<f32>();

        let total = power(&self.output);
        if total <= f32::EPSILON {
            return Ok(0.0);
        }
        Ok(power(&self.output[..low_bins.min(self.output.len())]) / total)
    }
}

/// Turns mono samples into per-block [`AnalysisFrame`]s.
pub struct AnalysisEngine {
    sample_rate: u32,
    summary: AnalysisSummary,
    frames: Vec<AnalysisFrame>,
    processed_samples: usize,
    last_low_share: f32,
    planner: RealFftPlanner<f32>,
    spectrum: Option<Spectrum>,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            sample_rate,
            summary: AnalysisSummary {
                sample_rate,
                ..Default::default()
            },
            frames: Vec::new(),
            processed_samples: 0,
            last_low_share: 0.0,
            planner: RealFftPlanner::new(),
            spectrum: None,
        }
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Forgets every analysed block; the FFT plan is kept.
    pub fn reset(&mut self) {
        self.summary = AnalysisSummary {
            sample_rate: self.sample_rate,
            ..Default::default()
        };
        self.frames.clear();
        self.processed_samples = 0;
        self.last_low_share = 0.0;
    }

    /// Splits `samples` into blocks of `block_size` and processes each one.
    /// A trailing block shorter than two samples is dropped.
    pub fn analyse(&mut self, samples: &[f32], block_size: usize) -> Result<&[AnalysisFrame]> {
        if block_size < 2 {
            return Err(PlaybackError::InvalidInput(
                "analysis blocks need at least two samples",
            ));
        }

        for block in samples.chunks(block_size).filter(|block| block.len() >= 2) {
            self.process_block(block)?;
        }
        Ok(&self.frames)
    }

    pub fn process_block(&mut self, samples: &[f32]) -> Result<AnalysisFrame> {
        if samples.len() < 2 {
            return Err(PlaybackError::InvalidInput(
                "analysis blocks need at least two samples",
            ));
        }

        let rate = self.sample_rate as f32;
        let center = (self.processed_samples as f32 + samples.len() as f32 / 2.0) / rate;

        let level = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        let low_share = self.spectrum_for(samples.len()).low_band_share(samples, rate)?;
        let boost = ((low_share - self.last_low_share) * BOOST_GAIN).clamp(0.0, 1.0);
        self.last_low_share = low_share;

        self.processed_samples += samples.len();
        self.summary.duration_seconds = self.processed_samples as f32 / rate;
        self.summary.peak_level = self.summary.peak_level.max(level);

        let frame = AnalysisFrame {
            time: center,
            level,
            boost,
        };
        self.frames.push(frame);
        Ok(frame)
    }

    pub fn frames(&self) -> &[AnalysisFrame] {
        &self.frames
    }

    /// Hands the recorded frames over, leaving the engine empty.
    pub fn take_frames(&mut self) -> Vec<AnalysisFrame> {
        std::mem::take(&mut self.frames)
    }

    fn spectrum_for(&mut self, size: usize) -> &mut Spectrum {
        if self.spectrum.as_ref().is_some_and(|spectrum| spectrum.size() != size) {
            self.spectrum = None;
        }
        let planner = &mut self.planner;
        self.spectrum.get_or_insert_with(|| Spectrum::new(planner, size))
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("summary", &self.summary)
            .field("frames", &self.frames.len())
            .field("fft_size", &self.spectrum.as_ref().map(Spectrum::size))
            .finish()
    }
}

/// The last frame stamped at or before `time`, or a silent frame.
pub fn sample_frames(frames: &[AnalysisFrame], time: f32) -> AnalysisFrame {
    let index = frames.partition_point(|frame| frame.time <= time);
    index
        .checked_sub(1)
        .map(|i| frames[i])
        .unwrap_or(AnalysisFrame {
            time,
            ..Default::default()
        })
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn tone(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_has_no_level_or_boost() {
        let mut engine = AnalysisEngine::with_sample_rate(48_000);
        let frame = engine.process_block(&vec![0.0; 1024]).unwrap();

        assert_eq!(frame.level, 0.0);
        assert_eq!(frame.boost, 0.0);
    }

    #[test]
    fn bass_onset_raises_boost_but_treble_does_not() {
        let mut engine = AnalysisEngine::with_sample_rate(8_000);
        engine.process_block(&vec![0.0; 1024]).unwrap();
        let kick = engine.process_block(&tone(60.0, 8_000, 1024)).unwrap();
        assert!(kick.boost > 0.5, "boost was {}", kick.boost);

        let mut engine = AnalysisEngine::with_sample_rate(8_000);
        engine.process_block(&vec![0.0; 1024]).unwrap();
        let hat = engine.process_block(&tone(3_000.0, 8_000, 1024)).unwrap();
        assert!(hat.boost < 0.1, "boost was {}", hat.boost);
        assert!(hat.level > 0.5);
    }

    #[test]
    fn analyse_chunks_and_tracks_duration() {
        let mut engine = AnalysisEngine::with_sample_rate(100);
        let frames = engine.analyse(&vec![0.5; 250], 50).unwrap().len();

        assert_eq!(frames, 5);
        let summary = engine.summary();
        assert!((summary.duration_seconds - 2.5).abs() < 1e-6);
        assert!((summary.peak_level - 0.5).abs() < 1e-6);
        assert!(engine.analyse(&[0.0; 8], 1).is_err());

        engine.reset();
        assert!(engine.frames().is_empty());
        assert_eq!(engine.summary().duration_seconds, 0.0);
    }

    #[test]
    fn sampling_returns_previous_frame() {
        let mut engine = AnalysisEngine::with_sample_rate(10);
        engine.analyse(&vec![1.0; 20], 10).unwrap();
        let frames = engine.take_frames();

        assert_eq!(sample_frames(&frames, 1.2).time, 0.5);
        assert_eq!(sample_frames(&frames, 1.5).time, 1.5);
        assert_eq!(sample_frames(&frames, 0.1).level, 0.0);
        assert!(engine.frames().is_empty());
    }
}
