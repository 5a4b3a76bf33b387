use super::kalman_filter::{KalmanFilter, Measurement, StateCov, StateMean};
use crate::object::{Detection, ObjectClass, Point};
use crate::rect::Rect;
use std::fmt::Debug;

/*----------------------------------------------------------------------------
TrackState enum
----------------------------------------------------------------------------*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    New,
    Active,
    Deleted,
}

/*----------------------------------------------------------------------------
Track struct
----------------------------------------------------------------------------*/

/// A persistent identity carried across frames.
#[derive(Clone)]
pub struct Track {
    kalman_filter: KalmanFilter,
    mean: StateMean,
    covariance: StateCov,
    rect: Rect<i32>,
    class: ObjectClass,
    last_point: Point,
    state: TrackState,
    track_id: u64,
    missed_frames: usize,
    hits: usize,
}

impl Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Track {{ track_id: {}, class: {}, state: {:?}, missed_frames: {}, hits: {}, position: ({:.1}, {:.1}), velocity: ({:.2}, {:.2}) }}",
            self.track_id,
            self.class,
            self.state,
            self.missed_frames,
            self.hits,
            self.mean[0],
            self.mean[1],
            self.mean[2],
            self.mean[3],
        )
    }
}

impl Track {
    pub(crate) fn new(kalman_filter: KalmanFilter, detection: &Detection, track_id: u64) -> Self {
        let last_point = detection.reference_point();
        Self {
            kalman_filter,
            mean: StateMean::zeros(),
            covariance: StateCov::zeros(),
            rect: detection.rect.clone(),
            class: detection.class,
            last_point,
            state: TrackState::New,
            track_id,
            missed_frames: 0,
            hits: 0,
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn rect(&self) -> &Rect<i32> {
        &self.rect
    }

    /// Reference point of the last matched detection.
    pub fn last_point(&self) -> Point {
        self.last_point
    }

    pub fn missed_frames(&self) -> usize {
        self.missed_frames
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Current filtered position estimate.
    pub fn position(&self) -> (f32, f32) {
        (self.mean[0], self.mean[1])
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.mean[2], self.mean[3])
    }

    pub(crate) fn activate(&mut self) {
        let point = self.last_point;
        self.kalman_filter.initiate(
            &mut self.mean,
            &mut self.covariance,
            &Measurement::new(point.x as f32, point.y as f32),
        );
        self.state = TrackState::Active;
        self.hits = 1;
        self.missed_frames = 0;
    }

    /// Advances the filter one frame and returns the predicted position.
    pub(crate) fn predict(&mut self) -> (f32, f32) {
        self.kalman_filter.predict(&mut self.mean, &mut self.covariance);
        self.position()
    }

    /// Corrects the filter with the detection, then records it.
    pub(crate) fn update(&mut self, detection: &Detection) {
        let point = detection.reference_point();
        self.kalman_filter.update(
            &mut self.mean,
            &mut self.covariance,
            &Measurement::new(point.x as f32, point.y as f32),
        );
        self.observe(detection);
    }

    /// Records a matched detection without touching the filter state.
    pub(crate) fn observe(&mut self, detection: &Detection) {
        self.rect = detection.rect.clone();
        self.class = detection.class;
        self.last_point = detection.reference_point();
        self.missed_frames = 0;
        self.hits += 1;
    }

    pub(crate) fn mark_missed(&mut self) -> usize {
        self.missed_frames += 1;
        self.missed_frames
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = TrackState::Deleted;
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.track_id == other.track_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> KalmanFilter {
        KalmanFilter::new(1e-2, 1.0, 10.0, 100.0)
    }

    #[test]
    fn test_activate_starts_at_reference_point() {
        let det = Detection::from_raw(10, 10, 30, 50, 0, 0.8).unwrap();
        let mut track = Track::new(filter(), &det, 7);
        assert_eq!(track.state(), TrackState::New);

        track.activate();

        assert_eq!(track.state(), TrackState::Active);
        assert_eq!(track.track_id(), 7);
        assert_eq!(track.position(), (20.0, 50.0));
        assert_eq!(track.velocity(), (0.0, 0.0));
        assert_eq!(track.hits(), 1);
    }

    #[test]
    fn test_update_resets_missed_frames() {
        let det = Detection::from_raw(10, 10, 30, 50, 2, 0.8).unwrap();
        let mut track = Track::new(filter(), &det, 0);
        track.activate();
        assert_eq!(track.mark_missed(), 1);
        assert_eq!(track.mark_missed(), 2);

        let next = Detection::from_raw(12, 10, 32, 50, 2, 0.8).unwrap();
        track.predict();
        track.update(&next);

        assert_eq!(track.missed_frames(), 0);
        assert_eq!(track.last_point(), Point::new(22, 30));
        assert_eq!(track.rect().get_xyxy(), [12, 10, 32, 50]);
        assert_eq!(track.hits(), 2);
    }

    #[test]
    fn test_observe_leaves_filter_untouched() {
        let det = Detection::from_raw(10, 10, 30, 50, 2, 0.8).unwrap();
        let mut track = Track::new(filter(), &det, 0);
        track.activate();
        track.mark_missed();

        let next = Detection::from_raw(40, 10, 60, 50, 2, 0.8).unwrap();
        track.observe(&next);

        assert_eq!(track.position(), (20.0, 30.0));
        assert_eq!(track.velocity(), (0.0, 0.0));
        assert_eq!(track.last_point(), Point::new(50, 30));
        assert_eq!(track.missed_frames(), 0);
        assert_eq!(track.hits(), 2);
    }

    #[test]
    fn test_mark_deleted() {
        let det = Detection::from_raw(0, 0, 4, 4, 3, 0.5).unwrap();
        let mut track = Track::new(filter(), &det, 1);
        track.activate();
        track.mark_deleted();
        assert_eq!(track.state(), TrackState::Deleted);
    }
}
