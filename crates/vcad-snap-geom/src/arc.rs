//! Elliptic and circular arcs.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Point3, Range3, Transform, Vec3};

use crate::curve::{minimize_on_interval, CurveLocation};
use crate::plane::Plane;

/// Sweeps within this of a full turn are full ellipses.
const FULL_CIRCLE_TOL: f64 = 1e-10;

/// Simpson intervals for non-circular length integrals (even).
const LENGTH_INTERVALS: usize = 256;

/// An elliptic arc `center + vector0·cos θ + vector90·sin θ` for
/// `θ ∈ [start_angle, start_angle + sweep]`.
///
/// Fractions run linearly in angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ellipse3 {
    /// Center.
    pub center: Point3,
    /// Vector to the point at angle 0.
    pub vector0: Vec3,
    /// Vector to the point at angle 90°.
    pub vector90: Vec3,
    /// Start angle in radians.
    pub start_angle: f64,
    /// Signed sweep in radians.
    pub sweep: f64,
}

impl Ellipse3 {
    /// Create an arc from its frame and angles.
    pub fn new(center: Point3, vector0: Vec3, vector90: Vec3, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            vector0,
            vector90,
            start_angle,
            sweep,
        }
    }

    /// Full circle of `radius` in the plane with the given normal.
    pub fn circle(center: Point3, radius: f64, normal: &Vec3) -> Self {
        let plane = Plane::from_normal(center, *normal);
        Self::new(
            center,
            plane.x_dir.into_inner() * radius,
            plane.y_dir.into_inner() * radius,
            0.0,
            TAU,
        )
    }

    /// Circular arc in a plane parallel to XY.
    pub fn arc_xy(center: Point3, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self::new(center, Vec3::x() * radius, Vec3::y() * radius, start_angle, sweep)
    }

    /// Full circle in a plane parallel to XY.
    pub fn circle_xy(center: Point3, radius: f64) -> Self {
        Self::arc_xy(center, radius, 0.0, TAU)
    }

    /// True if the sweep covers a whole turn.
    pub fn is_full(&self) -> bool {
        self.sweep.abs() >= TAU - FULL_CIRCLE_TOL
    }

    /// True if both axes are perpendicular and of equal length.
    pub fn is_circular(&self) -> bool {
        let (r0, r90) = self.radii();
        let scale = r0.max(r90);
        (r0 - r90).abs() <= 1e-10 * scale && self.vector0.dot(&self.vector90).abs() <= 1e-10 * scale * scale
    }

    /// Lengths of the two axis vectors.
    pub fn radii(&self) -> (f64, f64) {
        (self.vector0.norm(), self.vector90.norm())
    }

    /// Smaller of the two radii.
    pub fn min_radius(&self) -> f64 {
        let (r0, r90) = self.radii();
        r0.min(r90)
    }

    /// Angle at a fraction of the sweep.
    pub fn angle_at(&self, fraction: f64) -> f64 {
        self.start_angle + fraction * self.sweep
    }

    /// Point at angle `theta`.
    pub fn point_at_angle(&self, theta: f64) -> Point3 {
        let (s, c) = theta.sin_cos();
        self.center + self.vector0 * c + self.vector90 * s
    }

    /// Point at a fraction of the sweep.
    pub fn fraction_to_point(&self, fraction: f64) -> Point3 {
        self.point_at_angle(self.angle_at(fraction))
    }

    /// Derivative with respect to fraction.
    pub fn fraction_to_tangent(&self, fraction: f64) -> Vec3 {
        let (s, c) = self.angle_at(fraction).sin_cos();
        (self.vector90 * c - self.vector0 * s) * self.sweep
    }

    /// Unit normal of the arc plane.
    pub fn normal(&self) -> Option<Vec3> {
        self.vector0.cross(&self.vector90).try_normalize(1e-30)
    }

    /// Fraction of the sweep at which `theta` lies; values above one are
    /// outside the arc.
    pub fn angle_to_fraction(&self, theta: f64) -> f64 {
        if self.sweep.abs() < 1e-30 {
            return 0.0;
        }
        let delta = if self.sweep > 0.0 {
            (theta - self.start_angle).rem_euclid(TAU)
        } else {
            (self.start_angle - theta).rem_euclid(TAU)
        };
        delta / self.sweep.abs()
    }

    /// Closest point bounded to the swept portion.
    pub fn closest_point_bounded(&self, p: &Point3) -> CurveLocation {
        let mut candidates = Vec::with_capacity(3);
        if !self.is_full() {
            candidates.push(0.0);
            candidates.push(1.0);
        }
        if self.is_circular() {
            let d = p - self.center;
            let x = d.dot(&self.vector0);
            let y = d.dot(&self.vector90);
            let f = self.angle_to_fraction(y.atan2(x));
            if f <= 1.0 {
                candidates.push(f);
            }
        } else {
            let count = 64;
            let best = (0..=count)
                .map(|i| i as f64 / count as f64)
                .min_by(|a, b| {
                    let da = (self.fraction_to_point(*a) - p).norm_squared();
                    let db = (self.fraction_to_point(*b) - p).norm_squared();
                    da.total_cmp(&db)
                })
                .unwrap_or(0.0);
            let step = 1.0 / count as f64;
            candidates.push(minimize_on_interval(
                (best - step).max(0.0),
                (best + step).min(1.0),
                |f| (self.fraction_to_point(f) - p).norm_squared(),
            ));
        }
        let fraction = candidates
            .into_iter()
            .min_by(|a, b| {
                let da = (self.fraction_to_point(*a) - p).norm_squared();
                let db = (self.fraction_to_point(*b) - p).norm_squared();
                da.total_cmp(&db)
            })
            .unwrap_or(0.0);
        CurveLocation::new(fraction, self.fraction_to_point(fraction)).measured_from(p)
    }

    /// Signed length from fraction `f0` to `f1`.
    pub fn length_between(&self, f0: f64, f1: f64) -> f64 {
        if self.is_circular() {
            return self.radii().0 * self.sweep.abs() * (f1 - f0);
        }
        let h = (f1 - f0) / LENGTH_INTERVALS as f64;
        let speed = |f: f64| self.fraction_to_tangent(f).norm();
        let mut sum = speed(f0) + speed(f1);
        for i in 1..LENGTH_INTERVALS {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += w * speed(f0 + i as f64 * h);
        }
        sum * h / 3.0
    }

    /// Total arc length.
    pub fn length(&self) -> f64 {
        self.length_between(0.0, 1.0)
    }

    /// Fraction at arc length `distance` from the start, clamped to the arc.
    pub fn fraction_at_distance(&self, distance: f64) -> f64 {
        let total = self.length();
        if total <= 0.0 || distance <= 0.0 {
            return 0.0;
        }
        if distance >= total {
            return 1.0;
        }
        if self.is_circular() {
            return distance / total;
        }
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            if self.length_between(0.0, mid) < distance {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// Centroid of the arc treated as a wire.
    pub fn wire_centroid(&self) -> Point3 {
        if self.is_circular() {
            let half = 0.5 * self.sweep;
            let factor = if half.abs() < 1e-12 { 1.0 } else { half.sin() / half };
            let mid = self.point_at_angle(self.start_angle + half);
            return self.center + (mid - self.center) * factor;
        }
        let n = LENGTH_INTERVALS;
        let mut weighted = Vec3::zeros();
        let mut total = 0.0;
        for i in 0..n {
            let f = (i as f64 + 0.5) / n as f64;
            let w = self.fraction_to_tangent(f).norm();
            weighted += self.fraction_to_point(f).coords * w;
            total += w;
        }
        if total <= 0.0 {
            return self.center;
        }
        Point3::from(weighted / total)
    }

    /// Number of chords that keep the stroke close to the arc.
    pub fn stroke_count(&self) -> usize {
        ((self.sweep.abs() / (TAU / 128.0)).ceil() as usize).max(2)
    }

    /// Transform center and axes.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            center: t.apply_point(&self.center),
            vector0: t.apply_vec(&self.vector0),
            vector90: t.apply_vec(&self.vector90),
            ..*self
        }
    }

    /// Range of the stroked arc.
    pub fn range(&self) -> Range3 {
        let n = self.stroke_count();
        let points: Vec<Point3> = (0..=n)
            .map(|i| self.fraction_to_point(i as f64 / n as f64))
            .collect();
        Range3::from_points(points.iter())
    }
}
