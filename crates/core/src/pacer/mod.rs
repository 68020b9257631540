use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

/// Lowest update rate the pacer will target.
pub const BASE_UPDATE_RATE: u32 = 2000;
/// Highest update rate the pacer will target.
pub const MAX_UPDATE_RATE: u32 = 10_000;
/// Update loop runs this much faster than the measured draw rate.
const DRAW_RATE_FACTOR: f64 = 1.2;
/// Below this remaining wait the pacer yields instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

/// Cloneable handle the render loop uses to retarget the update loop.
#[derive(Debug, Clone)]
pub struct PacerHandle {
    target: Arc<AtomicU32>,
    floor: u32,
    ceiling: u32,
}

impl PacerHandle {
    /// Sets the target to `clamp(fps * 1.2, floor, ceiling)` and returns it.
    pub fn set_target_from_draw_rate(&self, measured_fps: f64) -> u32 {
        let target = target_for(measured_fps, self.floor, self.ceiling);
        self.target.store(target, Ordering::Relaxed);
        target
    }

    pub fn target(&self) -> u32 {
        self.target.load(Ordering::Relaxed)
    }
}

/// Adaptive frame limiter for the update loop.
#[derive(Debug)]
pub struct UpdatePacer {
    handle: PacerHandle,
    last_wake: Option<Instant>,
}

impl UpdatePacer {
    pub fn new() -> Self {
        Self::with_limits(BASE_UPDATE_RATE, MAX_UPDATE_RATE)
    }

    pub fn with_limits(floor: u32, ceiling: u32) -> Self {
        let floor = floor.max(1);
        let ceiling = ceiling.max(floor);
        Self {
            handle: PacerHandle {
                target: Arc::new(AtomicU32::new(floor)),
                floor,
                ceiling,
            },
            last_wake: None,
        }
    }

    pub fn handle(&self) -> PacerHandle {
        self.handle.clone()
    }

    pub fn target(&self) -> u32 {
        self.handle.target()
    }

    pub fn set_target_from_draw_rate(&self, measured_fps: f64) -> u32 {
        self.handle.set_target_from_draw_rate(measured_fps)
    }

    /// Forgets the last wake time; the next [`UpdatePacer::sync`] returns
    /// immediately.
    pub fn reset(&mut self) {
        self.last_wake = None;
    }

    /// Blocks until one period of the target rate has passed since the last
    /// wake. A loop that fell more than a period behind is re-based rather
    /// than allowed to burst.
    pub fn sync(&mut self) {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.target().max(1)));
        let now = Instant::now();

        let Some(last) = self.last_wake else {
            self.last_wake = Some(now);
            return;
        };

        let deadline = last + period;
        if now >= deadline {
            self.last_wake = Some(if now - deadline > period { now } else { deadline });
            return;
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if remaining > SPIN_THRESHOLD {
                thread::sleep(remaining - SPIN_THRESHOLD);
            } else {
                thread::yield_now();
            }
        }

        self.last_wake = Some(deadline);
    }
}

impl Default for UpdatePacer {
    fn default() -> Self {
        Self::new()
    }
}

fn target_for(measured_fps: f64, floor: u32, ceiling: u32) -> u32 {
    if !measured_fps.is_finite() {
        return floor;
    }
    (measured_fps * DRAW_RATE_FACTOR).clamp(f64::from(floor), f64::from(ceiling)) as u32
}

/// Rolling frame-time profiler.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    samples: VecDeque<f64>,
    sum: f64,
    capacity: usize,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::with_capacity(60)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
            capacity,
        }
    }

    /// Records a frame time in milliseconds.
    pub fn put_sample(&mut self, frame_ms: f64) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(frame_ms);
        self.sum += frame_ms;
    }

    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// Frames per second over the sampled window; zero until the first
    /// non-zero sample.
    pub fn fps(&self) -> f64 {
        let average = self.average_ms();
        if average <= 0.0 {
            0.0
        } else {
            1000.0 / average
        }
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_draw_rates_hit_the_floor() {
        let pacer = UpdatePacer::new();
        assert_eq!(pacer.set_target_from_draw_rate(100.0), 2000);
        assert_eq!(pacer.target(), 2000);
    }

    #[test]
    fn high_draw_rates_scale_then_clamp() {
        let pacer = UpdatePacer::new();
        let handle = pacer.handle();

        assert_eq!(handle.set_target_from_draw_rate(5000.0), 6000);
        assert_eq!(pacer.target(), 6000);
        assert_eq!(handle.set_target_from_draw_rate(50_000.0), 10_000);
        assert_eq!(handle.set_target_from_draw_rate(f64::NAN), 2000);
    }

    #[test]
    fn sync_waits_for_one_period() {
        let mut pacer = UpdatePacer::with_limits(100, 100);
        pacer.sync();

        let started = Instant::now();
        pacer.sync();
        pacer.sync();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(19), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "elapsed {elapsed:?}");
    }

    #[test]
    fn sync_does_not_burst_after_a_stall() {
        let mut pacer = UpdatePacer::with_limits(100, 100);
        pacer.sync();
        thread::sleep(Duration::from_millis(50));
        pacer.sync();

        let started = Instant::now();
        pacer.sync();
        assert!(started.elapsed() >= Duration::from_millis(9));
    }

    #[test]
    fn reset_skips_the_next_wait() {
        let mut pacer = UpdatePacer::with_limits(1, 1);
        pacer.sync();
        pacer.reset();

        let started = Instant::now();
        pacer.sync();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn frame_counter_reports_rolling_fps() {
        let mut counter = FrameCounter::with_capacity(4);
        assert_eq!(counter.fps(), 0.0);

        for _ in 0..4 {
            counter.put_sample(10.0);
        }
        assert!((counter.fps() - 100.0).abs() < 1e-9);

        for _ in 0..4 {
            counter.put_sample(20.0);
        }
        assert!((counter.average_ms() - 20.0).abs() < 1e-9);
        assert!((counter.fps() - 50.0).abs() < 1e-9);
    }
}
