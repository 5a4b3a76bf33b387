use super::assignment::{distance_matrix, linear_assignment, AssociationMode};
use super::kalman_filter::KalmanFilter;
use super::track::Track;
use crate::config::TrackerConfig;
use crate::object::Detection;
use crate::trajectory::TrajectoryEvent;
use log::{debug, trace};

/*-----------------------------------------------------------------------------
Associator
-----------------------------------------------------------------------------*/

/// Turns per-frame detections into long-lived tracks.
///
/// Every call to [`Associator::update`] predicts all active tracks, matches
/// them against the frame's detections and returns the trajectory events
/// the frame produced.
#[derive(Debug)]
pub struct Associator {
    gating_distance: f32,
    max_missed: usize,
    mode: AssociationMode,
    kalman_filter: KalmanFilter,

    frame_id: usize,
    next_track_id: u64,
    tracks: Vec<Track>,
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl Associator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            gating_distance: config.gating_distance,
            max_missed: config.max_missed,
            mode: config.mode,
            kalman_filter: KalmanFilter::new(
                config.process_noise,
                config.measurement_noise,
                config.initial_position_variance,
                config.initial_velocity_variance,
            ),
            frame_id: 0,
            next_track_id: 0,
            tracks: Vec::new(),
        }
    }

    /// Maximum distance at which a track may still claim a detection.
    pub fn with_gating_distance(self, gating_distance: f32) -> Self {
        Self {
            gating_distance,
            ..self
        }
    }

    /// Consecutive missed frames tolerated before a track is deleted.
    pub fn with_max_missed(self, max_missed: usize) -> Self {
        Self { max_missed, ..self }
    }

    pub fn with_mode(self, mode: AssociationMode) -> Self {
        Self { mode, ..self }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track_id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id() == track_id)
    }

    pub fn frame_id(&self) -> usize {
        self.frame_id
    }

    pub fn mode(&self) -> AssociationMode {
        self.mode
    }

    /// Advances every track by one frame.
    ///
    /// `timestamp` is the frame's stream time in seconds and is copied into
    /// the `Update` events.
    pub fn update(&mut self, detections: &[Detection], timestamp: f64) -> Vec<TrajectoryEvent> {
        self.frame_id += 1;
        let mut events = Vec::new();

        if self.tracks.is_empty() {
            for detection in detections {
                self.register(detection, timestamp, &mut events);
            }
            return events;
        }

        // Step 1: Predict (or, in greedy mode, reuse the last observation)
        let positions: Vec<(f32, f32)> = match self.mode {
            AssociationMode::Optimal => self.tracks.iter_mut().map(|t| t.predict()).collect(),
            AssociationMode::Greedy => self
                .tracks
                .iter()
                .map(|t| {
                    let p = t.last_point();
                    (p.x as f32, p.y as f32)
                })
                .collect(),
        };

        // Step 2: Match
        let points: Vec<_> = detections.iter().map(|d| d.reference_point()).collect();
        let cost_matrix = distance_matrix(&positions, &points);
        trace!("frame {} cost matrix: {}", self.frame_id, cost_matrix);
        let result = linear_assignment(&cost_matrix, self.gating_distance, self.mode);

        // Step 3: Update matched tracks. Greedy mode keeps no motion model.
        for &(trk_idx, det_idx) in &result.matches {
            let detection = &detections[det_idx];
            let track = &mut self.tracks[trk_idx];
            match self.mode {
                AssociationMode::Optimal => track.update(detection),
                AssociationMode::Greedy => track.observe(detection),
            }
            events.push(TrajectoryEvent::Update {
                track_id: track.track_id(),
                class: track.class(),
                point: points[det_idx],
                timestamp,
            });
        }

        // Step 4: Age unmatched tracks and delete the expired ones
        let mut expired = Vec::new();
        for &trk_idx in &result.unmatched_tracks {
            let track = &mut self.tracks[trk_idx];
            if track.mark_missed() > self.max_missed {
                track.mark_deleted();
                expired.push(trk_idx);
            }
        }
        expired.sort_unstable();
        for trk_idx in expired.into_iter().rev() {
            let track = self.tracks.remove(trk_idx);
            debug!("track {} deleted after {} missed frames", track.track_id(), track.missed_frames());
            events.push(TrajectoryEvent::Disappear {
                track_id: track.track_id(),
            });
        }

        // Step 5: Register unmatched detections
        for &det_idx in &result.unmatched_detections {
            self.register(&detections[det_idx], timestamp, &mut events);
        }

        events
    }

    /// Deletes every live track, emitting one `Disappear` per track.
    pub fn drain(&mut self) -> Vec<TrajectoryEvent> {
        self.tracks
            .drain(..)
            .map(|mut track| {
                track.mark_deleted();
                debug!("track {} closed", track.track_id());
                TrajectoryEvent::Disappear {
                    track_id: track.track_id(),
                }
            })
            .collect()
    }

    fn register(&mut self, detection: &Detection, timestamp: f64, events: &mut Vec<TrajectoryEvent>) {
        let track_id = self.next_track_id;
        self.next_track_id += 1;

        let mut track = Track::new(self.kalman_filter.clone(), detection, track_id);
        track.activate();
        debug!("track {} created ({}) at {:?}", track_id, track.class(), track.last_point());

        events.push(TrajectoryEvent::Update {
            track_id,
            class: track.class(),
            point: track.last_point(),
            timestamp,
        });
        self.tracks.push(track);
    }
}
