//! Named polygon regions of the camera view.
//!
//! The file format is a JSON array of `{ "type": "<label>", "points": [[x, y], ...] }`.

use crate::error::TrackError;
use crate::object::Point;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const UNKNOWN_REGION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "type")]
    pub kind: String,
    pub points: Vec<Point>,
}

impl Region {
    pub fn new(kind: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            kind: kind.into(),
            points,
        }
    }

    /// Point-in-polygon test. Points on an edge or vertex count as inside.
    pub fn contains(&self, point: Point) -> bool {
        let n = self.points.len();
        if n == 0 {
            return false;
        }

        let (px, py) = (point.x as i64, point.y as i64);
        let mut inside = false;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);

            // On segment a-b
            let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
            if cross == 0
                && px >= ax.min(bx)
                && px <= ax.max(bx)
                && py >= ay.min(by)
                && py <= ay.max(by)
            {
                return true;
            }

            // Ray cast towards +x
            if (ay > py) != (by > py) {
                // x coordinate of the edge at height py, compared without division
                let lhs = (px - ax) * (by - ay);
                let rhs = (bx - ax) * (py - ay);
                let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// Labels reference points with the regions they fall in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionClassifier {
    regions: Vec<Region>,
}

impl RegionClassifier {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TrackError> {
        let regions: Vec<Region> =
            serde_json::from_str(json).map_err(|e| TrackError::Region(e.to_string()))?;
        Ok(Self::new(regions))
    }

    /// Loads a polygon file. A missing file yields a classifier with no regions.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no region file at {}, starting with no regions", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .map_err(|e| TrackError::Region(format!("cannot read {}: {}", path.display(), e)))?;
        let classifier = Self::from_json_str(&json)?;
        debug!("loaded {} regions from {}", classifier.len(), path.display());
        Ok(classifier)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Labels of every region containing `point`, in file order.
    pub fn regions_containing(&self, point: Point) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| r.contains(point))
            .map(|r| r.kind.clone())
            .collect()
    }

    /// First containing region, or `"unknown"`.
    pub fn primary_region(&self, point: Point) -> String {
        self.regions
            .iter()
            .find(|r| r.contains(point))
            .map_or_else(|| UNKNOWN_REGION.to_string(), |r| r.kind.clone())
    }
}
