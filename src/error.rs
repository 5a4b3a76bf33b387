use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TrackError {
    #[error("lapjv error: {0}")]
    LapjvError(String),
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),
    #[error("could not open stream: {0}")]
    StreamOpen(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("detector error: {0}")]
    Detector(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("region error: {0}")]
    Region(String),
    #[error("trajectory aggregator is shut down")]
    AggregatorClosed,
}

impl From<rusqlite::Error> for TrackError {
    fn from(err: rusqlite::Error) -> Self {
        TrackError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Config(err.to_string())
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        TrackError::Config(err.to_string())
    }
}
