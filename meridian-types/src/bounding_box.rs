use serde::{Deserialize, Serialize};

use crate::Point2d;

/// Axis-aligned rectangle in some coordinate space.
///
/// The constructor normalizes the corners, so `x_min <= x_max` and `y_min <= y_max` always hold.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl BoundingBox {
    /// Creates a new box from two corners.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x_min: x0.min(x1),
            y_min: y0.min(y1),
            x_max: x0.max(x1),
            y_max: y0.max(y1),
        }
    }

    /// Degenerate box containing a single point.
    pub fn from_point(p: &Point2d) -> Self {
        Self {
            x_min: p.x,
            y_min: p.y,
            x_max: p.x,
            y_max: p.y,
        }
    }

    /// The smallest box containing all the given points, or `None` if the iterator is empty.
    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Point2d>) -> Option<Self> {
        let first = points.next()?;
        let mut bbox = Self::from_point(first);
        for p in points {
            bbox.expand_to_include(p);
        }

        Some(bbox)
    }

    /// Minimum x.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Maximum x.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Minimum y.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximum y.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Center point.
    pub fn center(&self) -> Point2d {
        Point2d::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns true if the point is inside the box or on its border.
    pub fn contains(&self, point: &Point2d) -> bool {
        self.x_min <= point.x
            && self.x_max >= point.x
            && self.y_min <= point.y
            && self.y_max >= point.y
    }

    /// Returns true if `other` lies completely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }

    /// Returns true if the boxes share at least one point.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.x_min > self.x_max
            || other.x_max < self.x_min
            || other.y_min > self.y_max
            || other.y_max < self.y_min)
    }

    /// Intersection of two boxes, or `None` if they don't intersect.
    pub fn intersect(&self, other: &BoundingBox) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        Some(Self {
            x_min: self.x_min.max(other.x_min),
            y_min: self.y_min.max(other.y_min),
            x_max: self.x_max.min(other.x_max),
            y_max: self.y_max.min(other.y_max),
        })
    }

    /// The smallest box containing both boxes.
    pub fn merge(&self, other: &BoundingBox) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Grows the box in place so that it contains the point.
    pub fn expand_to_include(&mut self, point: &Point2d) {
        self.x_min = self.x_min.min(point.x);
        self.y_min = self.y_min.min(point.y);
        self.x_max = self.x_max.max(point.x);
        self.y_max = self.y_max.max(point.y);
    }

    /// Returns a copy of the box grown by `amount` on every side. Negative values shrink the box.
    pub fn buffered(&self, amount: f64) -> Self {
        Self::new(
            self.x_min - amount,
            self.y_min - amount,
            self.x_max + amount,
            self.y_max + amount,
        )
    }

    /// Returns a box with the same center, but with width and height multiplied by `factor`.
    pub fn magnify(&self, factor: f64) -> Self {
        let center = self.center();
        let half_width = self.width() / 2.0 * factor;
        let half_height = self.height() / 2.0 * factor;
        Self::new(
            center.x - half_width,
            center.y - half_height,
            center.x + half_width,
            center.y + half_height,
        )
    }

    /// Corners of the box, counter-clockwise starting from the minimum corner.
    pub fn into_quadrangle(self) -> [Point2d; 4] {
        [
            Point2d::new(self.x_min, self.y_min),
            Point2d::new(self.x_max, self.y_min),
            Point2d::new(self.x_max, self.y_max),
            Point2d::new(self.x_min, self.y_max),
        ]
    }
}
