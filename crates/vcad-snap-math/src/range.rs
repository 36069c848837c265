//! Axis-aligned bounding ranges.

use serde::{Deserialize, Serialize};

use crate::{Point3, Transform};

/// Axis-aligned bounding range in 3D.
///
/// A null range (`low > high`) contains nothing and is the identity for
/// [`Range3::extend`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range3 {
    /// Minimum corner.
    pub low: Point3,
    /// Maximum corner.
    pub high: Point3,
}

impl Range3 {
    /// Create a range from two corners, reordering coordinates as needed.
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            low: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            high: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The empty range, suitable for expansion.
    pub fn null() -> Self {
        Self {
            low: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            high: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Range of a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut range = Self::null();
        for p in points {
            range.extend_point(p);
        }
        range
    }

    /// True if the range contains no points.
    pub fn is_null(&self) -> bool {
        self.low.x > self.high.x || self.low.y > self.high.y || self.low.z > self.high.z
    }

    /// Expand this range to include a point.
    pub fn extend_point(&mut self, p: &Point3) {
        self.low.x = self.low.x.min(p.x);
        self.low.y = self.low.y.min(p.y);
        self.low.z = self.low.z.min(p.z);
        self.high.x = self.high.x.max(p.x);
        self.high.y = self.high.y.max(p.y);
        self.high.z = self.high.z.max(p.z);
    }

    /// Expand this range to include another.
    pub fn extend(&mut self, other: &Range3) {
        if other.is_null() {
            return;
        }
        self.extend_point(&other.low);
        self.extend_point(&other.high);
    }

    /// Expand the range by `tol` in all directions.
    pub fn expand(&mut self, tol: f64) {
        if self.is_null() {
            return;
        }
        self.low.x -= tol;
        self.low.y -= tol;
        self.low.z -= tol;
        self.high.x += tol;
        self.high.y += tol;
        self.high.z += tol;
    }

    /// The eight corners of a non-null range.
    pub fn corners(&self) -> [Point3; 8] {
        let (l, h) = (self.low, self.high);
        [
            Point3::new(l.x, l.y, l.z),
            Point3::new(h.x, l.y, l.z),
            Point3::new(l.x, h.y, l.z),
            Point3::new(h.x, h.y, l.z),
            Point3::new(l.x, l.y, h.z),
            Point3::new(h.x, l.y, h.z),
            Point3::new(l.x, h.y, h.z),
            Point3::new(h.x, h.y, h.z),
        ]
    }

    /// Range of the transformed corners.
    pub fn transformed(&self, t: &Transform) -> Self {
        if self.is_null() {
            return *self;
        }
        let corners = self.corners().map(|c| t.apply_point(&c));
        Self::from_points(corners.iter())
    }

    /// Distance from `p` to the nearest point of the range (zero inside).
    ///
    /// A null range is infinitely far from everything.
    pub fn distance_outside(&self, p: &Point3) -> f64 {
        if self.is_null() {
            return f64::INFINITY;
        }
        let axis = |v: f64, lo: f64, hi: f64| {
            if v < lo {
                lo - v
            } else if v > hi {
                v - hi
            } else {
                0.0
            }
        };
        let dx = axis(p.x, self.low.x, self.high.x);
        let dy = axis(p.y, self.low.y, self.high.y);
        let dz = axis(p.z, self.low.z, self.high.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Test if two ranges overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Range3) -> bool {
        self.low.x <= other.high.x
            && self.high.x >= other.low.x
            && self.low.y <= other.high.y
            && self.high.y >= other.low.y
            && self.low.z <= other.high.z
            && self.high.z >= other.low.z
    }
}

impl Default for Range3 {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_outside() {
        let r = Range3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 0.0));
        assert_eq!(r.distance_outside(&Point3::new(5.0, 5.0, 0.0)), 0.0);
        assert!((r.distance_outside(&Point3::new(13.0, 14.0, 0.0)) - 5.0).abs() < 1e-12);
        assert!((r.distance_outside(&Point3::new(5.0, 5.0, -2.0)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_null_range() {
        let mut r = Range3::null();
        assert!(r.is_null());
        assert!(r.distance_outside(&Point3::origin()).is_infinite());
        r.extend(&Range3::null());
        assert!(r.is_null());
        r.extend_point(&Point3::new(1.0, 2.0, 3.0));
        assert!(!r.is_null());
        assert_eq!(r.low, r.high);
    }

    #[test]
    fn test_transformed_range() {
        let r = Range3::new(Point3::origin(), Point3::new(1.0, 2.0, 0.0));
        let t = Transform::rotation_about_axis(
            &crate::Dir3::new_normalize(crate::Vec3::z()),
            std::f64::consts::FRAC_PI_2,
        );
        let rt = r.transformed(&t);
        assert!((rt.low.x + 2.0).abs() < 1e-12);
        assert!((rt.high.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_overlaps() {
        let a = Range3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mut b = Range3::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(!a.overlaps(&b));
        b.expand(0.5);
        assert!(a.overlaps(&b));
    }
}
