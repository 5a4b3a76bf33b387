//! Collaborators that feed the pipeline: decoded frames and the detector.

use crate::error::TrackError;
use crate::object::Detection;
use log::{info, warn};
use std::collections::VecDeque;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Packed BGR24 pixels, row major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in stream ticks.
    pub pts: Option<i64>,
    /// Seconds per tick.
    pub time_base: f64,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, pts: Option<i64>, time_base: f64) -> Self {
        Self {
            data,
            width,
            height,
            pts,
            time_base,
        }
    }

    /// Frame without pixel data, for sources that only carry timing.
    pub fn empty(pts: Option<i64>, time_base: f64) -> Self {
        Self::new(Vec::new(), 0, 0, pts, time_base)
    }
}

/// Decoded video stream.
///
/// `Ok(None)` marks the end of the stream. A decode error ends the stream
/// for the caller; reconnecting means opening a new source.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, TrackError>;
}

/// Opens a decoded stream from a URL or path.
pub trait StreamOpener {
    type Source: FrameSource;

    fn open(&mut self, url: &str) -> Result<Self::Source, TrackError>;
}

/// Opens `url` through `opener`. Any failure is reported as
/// [`TrackError::StreamOpen`] and is fatal to the session.
pub fn open_stream<O: StreamOpener>(opener: &mut O, url: &str) -> Result<O::Source, TrackError> {
    match opener.open(url) {
        Ok(source) => {
            info!("opened stream {}", url);
            Ok(source)
        }
        Err(err @ TrackError::StreamOpen(_)) => Err(err),
        Err(err) => Err(TrackError::StreamOpen(format!("{}: {}", url, err))),
    }
}

/// Raw detector output: `(x1, y1, x2, y2, class_id, confidence)`.
pub type RawDetection = (i32, i32, i32, i32, usize, f32);

pub trait Detector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<RawDetection>, TrackError>;
}

/// Replays a fixed list of frames.
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: VecDeque<Result<VideoFrame, TrackError>>,
}

impl VecFrameSource {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Result<VideoFrame, TrackError>>,
    {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Frames with consecutive pts `0..count` at `time_base`.
    pub fn with_pts(count: usize, time_base: f64) -> Self {
        Self::new((0..count).map(|i| Ok(VideoFrame::empty(Some(i as i64), time_base))))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, TrackError> {
        self.frames.pop_front().transpose()
    }
}

/// Turns raw detector tuples into validated detections.
///
/// Boxes with non-positive extent are dropped with a warning.
pub fn validate_detections(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter()
        .filter_map(|&(x1, y1, x2, y2, class_id, prob)| {
            match Detection::from_raw(x1, y1, x2, y2, class_id, prob) {
                Ok(detection) => Some(detection),
                Err(err) => {
                    warn!("rejecting detection: {}", err);
                    None
                }
            }
        })
        .collect()
}
