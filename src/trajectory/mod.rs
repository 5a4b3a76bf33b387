//! Trajectory events and the records they are folded into.

pub mod aggregator;
pub mod storage;

use crate::object::{ObjectClass, Point};
use serde::{Deserialize, Serialize};

pub use aggregator::{AggregatorStats, TrajectoryAggregator};
pub use storage::{SqliteStore, StoredTrajectory, TrajectoryStore};

/// Message from the associator to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryEvent {
    /// The track was created or matched this frame.
    Update {
        track_id: u64,
        class: ObjectClass,
        point: Point,
        /// Stream time of the frame, in seconds.
        timestamp: f64,
    },
    /// The track exceeded its missed-frame allowance.
    Disappear { track_id: u64 },
}

impl TrajectoryEvent {
    pub fn track_id(&self) -> u64 {
        match self {
            TrajectoryEvent::Update { track_id, .. } => *track_id,
            TrajectoryEvent::Disappear { track_id } => *track_id,
        }
    }
}

/// Append-only point history of one live track.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub class: ObjectClass,
    pub points: Vec<Point>,
}

impl Trajectory {
    pub fn new(class: ObjectClass) -> Self {
        Self {
            class,
            points: Vec::new(),
        }
    }
}

/// A finished trajectory as handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub object_id: u64,
    pub object_type: String,
    pub path: Vec<Point>,
    /// Local time, `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: String,
}

/// Local wall-clock time in the storage timestamp format.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
