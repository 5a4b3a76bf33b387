pub mod config;
pub mod error;
pub mod object;
pub mod pipeline;
pub mod rect;
pub mod region;
pub mod scheduler;
pub mod stream;
pub mod tracker;
pub mod trajectory;

mod lapjv;

pub use config::PipelineConfig;
pub use error::TrackError;
pub use object::{Detection, ObjectClass, Point};
pub use pipeline::{FrameReport, Pipeline, TrackedObject};
pub use rect::Rect;
pub use region::RegionClassifier;
pub use scheduler::{FrameScheduler, FrameTiming};
pub use tracker::{AssociationMode, Associator};
pub use trajectory::{SqliteStore, TrajectoryAggregator, TrajectoryEvent, TrajectoryStore};
