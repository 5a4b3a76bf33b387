//! Pipeline configuration loaded from JSON.
//!
//! Every field has a default, so a partial file only overrides what it names.

use crate::error::TrackError;
use crate::tracker::AssociationMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive missed frames before a track is deleted.
    pub max_missed: usize,
    /// Largest distance, in pixels, at which a track may claim a detection.
    pub gating_distance: f32,
    pub mode: AssociationMode,

    // Motion model
    pub process_noise: f32,
    pub measurement_noise: f32,
    pub initial_position_variance: f32,
    pub initial_velocity_variance: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_missed: 40,
            gating_distance: 100.0,
            mode: AssociationMode::Optimal,
            process_noise: 1e-2,
            measurement_noise: 1.0,
            initial_position_variance: 10.0,
            initial_velocity_variance: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Inference runs on every Nth frame.
    pub skip_frames: usize,
    /// Lag behind stream time above which inference is skipped.
    pub max_latency_secs: f64,
    /// Gap between frames above which the stream is reported as stalled.
    pub stall_threshold_secs: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            skip_frames: 2,
            max_latency_secs: 0.5,
            stall_threshold_secs: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub workers: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub scheduler: SchedulerConfig,
    pub aggregator: AggregatorConfig,
    /// Detector class ids kept before association (person, car, truck).
    pub allowed_classes: Vec<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            scheduler: SchedulerConfig::default(),
            aggregator: AggregatorConfig::default(),
            allowed_classes: vec![0, 2, 3],
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, TrackError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let json = fs::read_to_string(path.as_ref()).map_err(|e| {
            TrackError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, TrackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        if self.scheduler.skip_frames == 0 {
            return Err(TrackError::Config("skip_frames must be at least 1".to_string()));
        }
        if self.aggregator.workers == 0 {
            return Err(TrackError::Config("workers must be at least 1".to_string()));
        }
        let tracker = &self.tracker;
        non_negative("gating_distance", tracker.gating_distance as f64)?;
        non_negative("process_noise", tracker.process_noise as f64)?;
        positive("measurement_noise", tracker.measurement_noise as f64)?;
        positive("initial_position_variance", tracker.initial_position_variance as f64)?;
        positive("initial_velocity_variance", tracker.initial_velocity_variance as f64)?;
        non_negative("max_latency_secs", self.scheduler.max_latency_secs)?;
        positive("stall_threshold_secs", self.scheduler.stall_threshold_secs)?;
        Ok(())
    }

    pub fn is_class_allowed(&self, class_id: usize) -> bool {
        self.allowed_classes.contains(&class_id)
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), TrackError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrackError::Config(format!("{} must be non-negative, got {}", name, value)))
    }
}

fn positive(name: &str, value: f64) -> Result<(), TrackError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackError::Config(format!("{} must be positive, got {}", name, value)))
    }
}
