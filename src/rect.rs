use crate::error::TrackError;
use nalgebra::Matrix1x4;
use num::Num;
use std::fmt::Debug;

/* ------------------------------------------------------------------------------
 * Type aliases
 * ------------------------------------------------------------------------------ */
pub type Xyxy<T> = Matrix1x4<T>;

/* ------------------------------------------------------------------------------
 * Rect struct
 * ------------------------------------------------------------------------------ */

/// Axis-aligned pixel box stored as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rect<T>
where
    T: Num + Copy + PartialOrd + Debug + 'static,
{
    xyxy: Xyxy<T>,
}

impl<T> Rect<T>
where
    T: Num + Copy + PartialOrd + Debug + 'static,
{
    /// Build a rect without checking the corner ordering.
    pub fn new(x1: T, y1: T, x2: T, y2: T) -> Self {
        Self {
            xyxy: Matrix1x4::new(x1, y1, x2, y2),
        }
    }

    /// Build a rect, rejecting boxes with `x1 >= x2` or `y1 >= y2`.
    pub fn try_from_xyxy(x1: T, y1: T, x2: T, y2: T) -> Result<Self, TrackError> {
        if x1 >= x2 || y1 >= y2 {
            return Err(TrackError::InvalidBox(format!(
                "expected x1 < x2 and y1 < y2, got [{:?}, {:?}, {:?}, {:?}]",
                x1, y1, x2, y2
            )));
        }
        Ok(Self::new(x1, y1, x2, y2))
    }

    #[inline(always)]
    pub fn x1(&self) -> T {
        self.xyxy[(0, 0)]
    }

    #[inline(always)]
    pub fn y1(&self) -> T {
        self.xyxy[(0, 1)]
    }

    #[inline(always)]
    pub fn x2(&self) -> T {
        self.xyxy[(0, 2)]
    }

    #[inline(always)]
    pub fn y2(&self) -> T {
        self.xyxy[(0, 3)]
    }

    #[inline(always)]
    pub fn width(&self) -> T {
        self.x2() - self.x1()
    }

    #[inline(always)]
    pub fn height(&self) -> T {
        self.y2() - self.y1()
    }

    pub fn get_xyxy(&self) -> [T; 4] {
        [self.x1(), self.y1(), self.x2(), self.y2()]
    }

    /// Box centre, `((x1 + x2) / 2, (y1 + y2) / 2)`.
    ///
    /// Integer instantiations truncate, matching pixel arithmetic.
    pub fn centroid(&self) -> (T, T) {
        let two = T::one() + T::one();
        ((self.x1() + self.x2()) / two, (self.y1() + self.y2()) / two)
    }

    /// Bottom-centre of the box, `((x1 + x2) / 2, y2)`.
    pub fn foot_point(&self) -> (T, T) {
        let two = T::one() + T::one();
        ((self.x1() + self.x2()) / two, self.y2())
    }
}

impl<T> TryFrom<&[T]> for Rect<T>
where
    T: Num + Copy + PartialOrd + Debug + 'static,
{
    type Error = TrackError;

    /// Reads the first four values as `[x1, y1, x2, y2]`; trailing values
    /// (class id, score) are ignored.
    fn try_from(coords: &[T]) -> Result<Self, Self::Error> {
        if coords.len() < 4 {
            return Err(TrackError::InvalidBox(format!(
                "bbox must have at least 4 elements [x1, y1, x2, y2], got {}",
                coords.len()
            )));
        }
        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_and_foot_point() {
        let rect = Rect::new(10, 20, 31, 60);
        assert_eq!(rect.centroid(), (20, 40));
        assert_eq!(rect.foot_point(), (20, 60));
        assert_eq!(rect.width(), 21);
        assert_eq!(rect.height(), 40);
    }

    #[test]
    fn test_centroid_float() {
        let rect = Rect::new(0.0f32, 0.0, 5.0, 3.0);
        assert_eq!(rect.centroid(), (2.5, 1.5));
        assert_eq!(rect.foot_point(), (2.5, 3.0));
    }

    #[test]
    fn test_try_from_slice_too_short() {
        let coords = [1, 2, 3];
        let res = Rect::try_from(&coords[..]);
        assert!(matches!(res, Err(TrackError::InvalidBox(_))));
    }

    #[test]
    fn test_try_from_slice_ignores_extra_fields() {
        let coords = [1, 2, 3, 4, 0];
        let rect = Rect::try_from(&coords[..]).unwrap();
        assert_eq!(rect.get_xyxy(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_try_from_xyxy_rejects_degenerate() {
        assert!(Rect::try_from_xyxy(5, 5, 5, 10).is_err());
        assert!(Rect::try_from_xyxy(5, 10, 8, 2).is_err());
        assert!(Rect::try_from_xyxy(0, 0, 1, 1).is_ok());
    }
}
