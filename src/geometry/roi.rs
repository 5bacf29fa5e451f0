//! Axis-aligned image regions.

use nalgebra::Point2;

/// Axis-aligned rectangle in pixel coordinates.
///
/// Containment is half-open: a point on the left/top edge is inside, a point
/// on the right/bottom edge is not. This matches OpenCV's `Rect::contains`,
/// which the detection boxes originate from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Roi {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn contains(&self, pt: &Point2<f64>) -> bool {
        self.x <= pt.x
            && pt.x < self.x + self.width
            && self.y <= pt.y
            && pt.y < self.y + self.height
    }

    /// Shrink the rectangle symmetrically: each side moves inward by
    /// `factor / 2` of the corresponding dimension.
    pub fn shrunk(&self, factor: f64) -> Self {
        Self {
            x: self.x + factor * self.width / 2.0,
            y: self.y + factor * self.height / 2.0,
            width: self.width * (1.0 - factor),
            height: self.height * (1.0 - factor),
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}
