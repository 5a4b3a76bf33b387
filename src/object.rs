use crate::error::TrackError;
use crate::rect::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/*------------------------------------------------------------------------------
ObjectClass enum
------------------------------------------------------------------------------*/

/// Detector class ids understood by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Person,
    Car,
    Truck,
    Unknown(usize),
}

impl ObjectClass {
    pub fn from_id(class_id: usize) -> Self {
        match class_id {
            0 => ObjectClass::Person,
            2 => ObjectClass::Car,
            3 => ObjectClass::Truck,
            other => ObjectClass::Unknown(other),
        }
    }

    pub fn id(&self) -> usize {
        match self {
            ObjectClass::Person => 0,
            ObjectClass::Car => 2,
            ObjectClass::Truck => 3,
            ObjectClass::Unknown(id) => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::Car => "car",
            ObjectClass::Truck => "truck",
            ObjectClass::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/*------------------------------------------------------------------------------
Point struct
------------------------------------------------------------------------------*/

/// Pixel coordinate. Serialises as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x as f32 - x;
        let dy = self.y as f32 - y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[i32; 2]> for Point {
    fn from(xy: [i32; 2]) -> Self {
        Self::new(xy[0], xy[1])
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/*------------------------------------------------------------------------------
Detection struct
------------------------------------------------------------------------------*/

/// One detector output for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rect: Rect<i32>,
    pub class: ObjectClass,
    pub prob: f32,
}

impl Detection {
    pub fn new(rect: Rect<i32>, class: ObjectClass, prob: f32) -> Self {
        Self { rect, class, prob }
    }

    /// Build from the detector tuple `(x1, y1, x2, y2, class, confidence)`.
    pub fn from_raw(
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        class_id: usize,
        prob: f32,
    ) -> Result<Self, TrackError> {
        let rect = Rect::try_from_xyxy(x1, y1, x2, y2)?;
        Ok(Self::new(rect, ObjectClass::from_id(class_id), prob))
    }

    /// Foot point for people, centroid for everything else.
    pub fn reference_point(&self) -> Point {
        let (x, y) = match self.class {
            ObjectClass::Person => self.rect.foot_point(),
            _ => self.rect.centroid(),
        };
        Point::new(x, y)
    }
}
