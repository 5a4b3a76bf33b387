//! Per-frame driver: schedule, detect, associate, hand events to the aggregator.

use crate::config::PipelineConfig;
use crate::error::TrackError;
use crate::object::{Detection, ObjectClass, Point};
use crate::region::RegionClassifier;
use crate::scheduler::{Clock, FrameScheduler, FrameTiming, SystemClock};
use crate::stream::{validate_detections, Detector, FrameSource, RawDetection};
use crate::tracker::Associator;
use crate::trajectory::{AggregatorStats, TrajectoryAggregator, TrajectoryStore};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A live track as seen on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: u64,
    pub class: ObjectClass,
    /// Reference point of the last matched detection.
    pub point: Point,
    pub missed_frames: usize,
    /// Labels of the regions containing `point`.
    pub regions: Vec<String>,
}

impl TrackedObject {
    /// First containing region, or `"unknown"`.
    pub fn primary_region(&self) -> &str {
        self.regions
            .first()
            .map_or(crate::region::UNKNOWN_REGION, String::as_str)
    }
}

/// What happened on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: usize,
    pub timing: FrameTiming,
    pub stalled: bool,
    /// True when the detector ran on this frame.
    pub inference_ran: bool,
    /// Detections fed to the associator (possibly reused from an earlier frame).
    pub detections: Vec<Detection>,
    pub objects: Vec<TrackedObject>,
}

pub struct Pipeline<S, D, C = SystemClock>
where
    S: FrameSource,
    D: Detector,
    C: Clock,
{
    source: S,
    detector: D,
    scheduler: FrameScheduler<C>,
    associator: Associator,
    aggregator: TrajectoryAggregator,
    regions: RegionClassifier,
    config: PipelineConfig,
    prev_detections: Vec<Detection>,
}

impl<S, D> Pipeline<S, D, SystemClock>
where
    S: FrameSource,
    D: Detector,
{
    pub fn new(
        config: &PipelineConfig,
        source: S,
        detector: D,
        store: Arc<dyn TrajectoryStore>,
    ) -> Result<Self, TrackError> {
        Self::with_clock(config, source, detector, store, SystemClock)
    }
}

impl<S, D, C> Pipeline<S, D, C>
where
    S: FrameSource,
    D: Detector,
    C: Clock,
{
    pub fn with_clock(
        config: &PipelineConfig,
        source: S,
        detector: D,
        store: Arc<dyn TrajectoryStore>,
        clock: C,
    ) -> Result<Self, TrackError> {
        config.validate()?;
        Ok(Self {
            source,
            detector,
            scheduler: FrameScheduler::with_clock(&config.scheduler, clock),
            associator: Associator::new(&config.tracker),
            aggregator: TrajectoryAggregator::new(config.aggregator.workers, store)?,
            regions: RegionClassifier::default(),
            config: config.clone(),
            prev_detections: Vec::new(),
        })
    }

    pub fn with_regions(self, regions: RegionClassifier) -> Self {
        Self { regions, ..self }
    }

    pub fn associator(&self) -> &Associator {
        &self.associator
    }

    pub fn aggregator(&self) -> &TrajectoryAggregator {
        &self.aggregator
    }

    pub fn scheduler(&self) -> &FrameScheduler<C> {
        &self.scheduler
    }

    /// Processes the next frame. `Ok(None)` at end of stream; decode errors
    /// are returned as-is.
    pub fn step(&mut self) -> Result<Option<FrameReport>, TrackError> {
        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };

        let decision = self.scheduler.schedule(frame.pts, frame.time_base);

        let detections = if decision.run_inference {
            match self.detector.detect(&frame) {
                Ok(raw) => {
                    let detections = self.filter_detections(&raw);
                    self.prev_detections = detections.clone();
                    detections
                }
                Err(err) => {
                    warn!("detector failed on frame {}: {}", decision.frame_index, err);
                    self.prev_detections.clear();
                    Vec::new()
                }
            }
        } else {
            self.prev_detections.clone()
        };

        let events = self
            .associator
            .update(&detections, decision.timing.frame_time);
        self.aggregator.submit_all(events)?;

        let objects = self
            .associator
            .tracks()
            .iter()
            .map(|track| {
                let point = track.last_point();
                TrackedObject {
                    id: track.track_id(),
                    class: track.class(),
                    point,
                    missed_frames: track.missed_frames(),
                    regions: self.regions.regions_containing(point),
                }
            })
            .collect();

        Ok(Some(FrameReport {
            frame_index: decision.frame_index,
            timing: decision.timing,
            stalled: decision.stalled,
            inference_ran: decision.run_inference,
            detections,
            objects,
        }))
    }

    /// Runs until the stream ends or `stop` is set, passing every report to
    /// `on_frame`. Returns the number of frames processed.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_frame: F) -> Result<usize, TrackError>
    where
        F: FnMut(FrameReport),
    {
        let mut frames = 0;
        while !stop.load(Ordering::Acquire) {
            match self.step()? {
                Some(report) => {
                    frames += 1;
                    on_frame(report);
                }
                None => {
                    info!("end of stream after {} frames", frames);
                    break;
                }
            }
        }
        Ok(frames)
    }

    /// Closes every live track, waits for the aggregator to drain and
    /// returns its counters.
    pub fn finish(mut self) -> AggregatorStats {
        let events = self.associator.drain();
        if let Err(err) = self.aggregator.submit_all(events) {
            warn!("could not flush open tracks: {}", err);
        }
        self.aggregator.join()
    }

    fn filter_detections(&self, raw: &[RawDetection]) -> Vec<Detection> {
        let allowed: Vec<RawDetection> = raw
            .iter()
            .copied()
            .filter(|&(_, _, _, _, class_id, _)| self.config.is_class_allowed(class_id))
            .collect();
        validate_detections(&allowed)
    }
}
