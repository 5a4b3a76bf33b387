pub mod assignment;
pub mod associator;
pub(crate) mod kalman_filter;
pub mod track;

pub use assignment::{AssignmentResult, AssociationMode};
pub use associator::Associator;
pub use track::{Track, TrackState};
