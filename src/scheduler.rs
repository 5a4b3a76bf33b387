//! Pacing of frame consumption against stream time.

use crate::config::SchedulerConfig;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time source used by [`FrameScheduler`].
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly.
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// Time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Timing of one frame, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    /// Presentation time relative to the first frame.
    pub frame_time: f64,
    /// Wall-clock time since the first frame arrived.
    pub elapsed: f64,
    /// `frame_time - elapsed`. Negative when processing lags the stream.
    pub delay: f64,
}

impl FrameTiming {
    pub fn latency(&self) -> f64 {
        self.delay.abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDecision {
    /// 1-based index of the frame.
    pub frame_index: usize,
    pub timing: FrameTiming,
    /// Wall-clock gap since the previous frame arrived.
    pub gap: Duration,
    pub stalled: bool,
    /// False when the stream is lagging by more than the latency budget.
    pub processing_allowed: bool,
    /// True when the detector should run on this frame.
    pub run_inference: bool,
}

pub struct FrameScheduler<C: Clock = SystemClock> {
    skip_frames: usize,
    max_latency: f64,
    stall_threshold: Duration,
    clock: C,

    base_pts: Option<i64>,
    start: Option<Instant>,
    last_arrival: Instant,
    frame_count: usize,
}

impl FrameScheduler<SystemClock> {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> FrameScheduler<C> {
    pub fn with_clock(config: &SchedulerConfig, clock: C) -> Self {
        let last_arrival = clock.now();
        Self {
            skip_frames: config.skip_frames.max(1),
            max_latency: config.max_latency_secs,
            stall_threshold: Duration::try_from_secs_f64(config.stall_threshold_secs.max(0.0))
                .unwrap_or(Duration::MAX),
            clock,
            base_pts: None,
            start: None,
            last_arrival,
            frame_count: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Decides what to do with the next frame.
    ///
    /// Sleeps when the frame is ahead of wall-clock time. The first frame
    /// anchors both the pts base and the wall-clock start. A frame more than
    /// the stall threshold ahead re-anchors both instead of sleeping.
    pub fn schedule(&mut self, pts: Option<i64>, time_base: f64) -> FrameDecision {
        self.frame_count += 1;

        let arrival = self.clock.now();
        let gap = arrival.saturating_duration_since(self.last_arrival);
        self.last_arrival = arrival;
        let stalled = gap > self.stall_threshold;
        if stalled {
            warn!(
                "no frames received for {:.1}s (threshold {:.1}s), slow or stalled stream",
                gap.as_secs_f64(),
                self.stall_threshold.as_secs_f64()
            );
        }

        if self.base_pts.is_none() {
            self.base_pts = pts;
            if let Some(base) = pts {
                debug!("stream base pts {}", base);
            }
        }
        let start = *self.start.get_or_insert(arrival);

        let mut timing = self.timing(pts, time_base, start);
        let max_ahead = self.stall_threshold.as_secs_f64();
        if timing.delay.is_nan() || timing.delay > max_ahead {
            // Forward pts discontinuity: restart stream time at this frame.
            warn!(
                "frame {} is {:.1}s ahead of the stream clock, re-anchoring",
                self.frame_count, timing.delay
            );
            let now = self.clock.now();
            self.base_pts = pts;
            self.start = Some(now);
            timing = self.timing(pts, time_base, now);
        }

        let mut processing_allowed = true;
        if timing.delay > 0.0 {
            if let Ok(pause) = Duration::try_from_secs_f64(timing.delay.min(max_ahead)) {
                self.clock.sleep(pause);
            }
        } else if timing.latency() > self.max_latency {
            processing_allowed = false;
            warn!(
                "frame {} is {:.2}s behind, skipping inference",
                self.frame_count,
                timing.latency()
            );
        }

        FrameDecision {
            frame_index: self.frame_count,
            timing,
            gap,
            stalled,
            processing_allowed,
            run_inference: processing_allowed && self.frame_count % self.skip_frames == 0,
        }
    }

    fn timing(&self, pts: Option<i64>, time_base: f64, start: Instant) -> FrameTiming {
        let relative_pts = match (pts, self.base_pts) {
            (Some(pts), Some(base)) => pts.checked_sub(base).unwrap_or_else(|| {
                warn!("pts {} out of range against base {}, treating as missing", pts, base);
                0
            }),
            _ => 0,
        };
        let frame_time = relative_pts as f64 * time_base;
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(start)
            .as_secs_f64();
        FrameTiming {
            frame_time,
            elapsed,
            delay: frame_time - elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearly_eq::assert_nearly_eq;

    const TB: f64 = 1.0 / 30.0;

    fn scheduler(skip_frames: usize) -> (FrameScheduler<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let config = SchedulerConfig {
            skip_frames,
            ..SchedulerConfig::default()
        };
        (FrameScheduler::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_first_frame_anchors_timing() {
        let (mut scheduler, clock) = scheduler(1);
        clock.advance(Duration::from_secs(2));

        let decision = scheduler.schedule(Some(9000), TB);

        assert_eq!(decision.frame_index, 1);
        assert_eq!(decision.timing, FrameTiming::default());
        assert!(decision.processing_allowed);
        assert!(decision.run_inference);
    }

    #[test]
    fn test_sleeps_when_ahead_of_stream() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(100), TB);

        let decision = scheduler.schedule(Some(115), TB);

        assert_nearly_eq!(decision.timing.frame_time, 0.5, 1e-9);
        assert_nearly_eq!(decision.timing.delay, 0.5, 1e-9);
        assert_nearly_eq!(clock.elapsed().as_secs_f64(), 0.5, 1e-6);
        assert!(decision.processing_allowed);
    }

    #[test]
    fn test_lagging_frame_skips_inference() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), TB);
        clock.advance(Duration::from_secs(2));

        let decision = scheduler.schedule(Some(3), TB);

        assert_nearly_eq!(decision.timing.delay, 0.1 - 2.0, 1e-6);
        assert_nearly_eq!(decision.timing.latency(), 1.9, 1e-6);
        assert!(!decision.processing_allowed);
        assert!(!decision.run_inference);
        // No sleep while behind.
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_small_lag_is_tolerated() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), TB);
        clock.advance(Duration::from_millis(400));

        let decision = scheduler.schedule(Some(3), TB);

        assert!(decision.timing.delay < 0.0);
        assert!(decision.processing_allowed);
    }

    #[test]
    fn test_inference_every_nth_frame() {
        let (mut scheduler, _clock) = scheduler(3);
        let ran: Vec<bool> = (0..9)
            .map(|i| scheduler.schedule(Some(i), TB).run_inference)
            .collect();
        assert_eq!(
            ran,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_missing_pts_counts_as_stream_start() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(None, TB);
        clock.advance(Duration::from_secs(1));

        let decision = scheduler.schedule(None, TB);

        assert_eq!(decision.timing.frame_time, 0.0);
        assert_nearly_eq!(decision.timing.delay, -1.0, 1e-6);
        assert!(!decision.processing_allowed);
    }

    #[test]
    fn test_overflowing_pts_counts_as_missing() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(1000), 1.0 / 90000.0);
        clock.advance(Duration::from_millis(100));

        let decision = scheduler.schedule(Some(i64::MIN), 1.0 / 90000.0);

        assert_eq!(decision.timing.frame_time, 0.0);
        assert_nearly_eq!(decision.timing.delay, -0.1, 1e-6);
        assert!(decision.processing_allowed);
    }

    #[test]
    fn test_forward_pts_jump_reanchors_instead_of_sleeping() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), 1.0 / 90000.0);

        let jumped = scheduler.schedule(Some(i64::MAX), 1.0 / 90000.0);

        assert_eq!(jumped.timing, FrameTiming::default());
        assert!(jumped.run_inference);
        assert_eq!(clock.elapsed(), Duration::ZERO);

        // Pacing resumes relative to the new anchor.
        let mut scheduler = FrameScheduler::with_clock(&SchedulerConfig::default(), clock.clone());
        scheduler.schedule(Some(0), 1.0 / 90000.0);
        scheduler.schedule(Some(10_000_000_000), 1.0 / 90000.0);
        let next = scheduler.schedule(Some(10_000_090_000), 1.0 / 90000.0);
        assert_nearly_eq!(next.timing.delay, 1.0, 1e-6);
        assert_nearly_eq!(clock.elapsed().as_secs_f64(), 1.0, 1e-6);
    }

    #[test]
    fn test_huge_time_base_does_not_panic() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), f64::MAX);

        let decision = scheduler.schedule(Some(10), f64::MAX);

        assert_eq!(decision.timing, FrameTiming::default());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_stall_is_reported() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), TB);
        clock.advance(Duration::from_secs(6));

        let decision = scheduler.schedule(Some(180), TB);

        assert!(decision.stalled);
        assert_eq!(decision.gap, Duration::from_secs(6));
        // Stream time advanced by the same amount, so no lag.
        assert!(decision.processing_allowed);
    }

    #[test]
    fn test_regular_gap_is_not_stalled() {
        let (mut scheduler, clock) = scheduler(1);
        scheduler.schedule(Some(0), TB);
        clock.advance(Duration::from_millis(33));
        let decision = scheduler.schedule(Some(1), TB);
        assert!(!decision.stalled);
        assert_eq!(decision.gap, Duration::from_millis(33));
    }
}
