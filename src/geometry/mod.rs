pub mod hull;
pub mod line;
pub mod raster;

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

pub use hull::convex_hull_indices;
pub use line::{ClusterTag, ClusteredLine, Line};
pub use raster::PixelWalk;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (*self - *other).norm()
    }

    pub fn round(&self) -> Pixel {
        Pixel::new(self.x.round() as i32, self.y.round() as i32)
    }

    /// Lexicographic order on (x, y); equal points compare as ordered.
    pub fn lex_le(&self, other: &Point2) -> bool {
        self.x < other.x || (self.x == other.x && self.y <= other.y)
    }
}

impl Add for Point2 {
    type Output = Point2;

    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
}

impl Pixel {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as u32) < width && (self.y as u32) < height
    }

    pub fn to_point(&self) -> Point2 {
        Point2::new(self.x as f64, self.y as f64)
    }
}

impl From<Pixel> for imageproc::point::Point<i32> {
    fn from(p: Pixel) -> Self {
        imageproc::point::Point::new(p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_order() {
        let a = Point2::new(1.0, 5.0);
        let b = Point2::new(2.0, 0.0);
        let c = Point2::new(1.0, 6.0);

        assert!(a.lex_le(&b));
        assert!(!b.lex_le(&a));
        assert!(a.lex_le(&c));
        assert!(a.lex_le(&a));
    }

    #[test]
    fn test_round_and_bounds() {
        let p = Point2::new(3.6, -0.4).round();
        assert_eq!(p, Pixel::new(4, 0));
        assert!(p.in_bounds(5, 1));
        assert!(!Pixel::new(5, 0).in_bounds(5, 1));
        assert!(!Pixel::new(-1, 0).in_bounds(5, 1));
    }
}
