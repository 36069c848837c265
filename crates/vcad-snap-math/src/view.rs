//! Projective world-to-view maps.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::{Point3, Transform, Vec3};

/// A homogeneous point `(x, y, z, w)`.
pub type Point4 = Vector4<f64>;

/// Weights smaller than this are treated as points at infinity.
const MIN_WEIGHT: f64 = 1.0e-12;

/// A 4x4 projective map with its inverse.
///
/// `forward` takes world (or local) coordinates to view coordinates where
/// `x`/`y` are pixels and `z` is depth; `inverse` maps back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMap {
    /// World to view.
    pub forward: Matrix4<f64>,
    /// View to world.
    pub inverse: Matrix4<f64>,
}

impl ViewMap {
    /// Build a map from its forward matrix, computing the inverse.
    pub fn new(forward: Matrix4<f64>) -> Option<Self> {
        forward
            .try_inverse()
            .map(|inverse| Self { forward, inverse })
    }

    /// Identity map (world units are pixels).
    pub fn identity() -> Self {
        Self {
            forward: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    /// Orthographic top view scaling world units to pixels.
    pub fn scaled_top_view(pixels_per_unit: f64) -> Option<Self> {
        Self::new(Transform::scale(pixels_per_unit, pixels_per_unit, pixels_per_unit).matrix)
    }

    /// The map swapped end for end (view to world becomes forward).
    pub fn inverted(&self) -> Self {
        Self {
            forward: self.inverse,
            inverse: self.forward,
        }
    }

    /// Prepend an affine local-to-world transform, producing local-to-view.
    pub fn with_local(&self, local_to_world: &Transform) -> Option<Self> {
        let world_to_local = local_to_world.inverse()?;
        Some(Self {
            forward: self.forward * local_to_world.matrix,
            inverse: world_to_local.matrix * self.inverse,
        })
    }

    /// Project a point without normalizing the weight.
    pub fn project(&self, p: &Point3) -> Point4 {
        self.forward * Point4::new(p.x, p.y, p.z, 1.0)
    }

    /// Map a homogeneous view point back with the inverse matrix.
    pub fn unproject(&self, v: &Point4) -> Point4 {
        self.inverse * v
    }

    /// Project and normalize, failing for points at infinity.
    pub fn to_view(&self, p: &Point3) -> Option<Point3> {
        normalize(&self.project(p))
    }

    /// Unproject a normalized view point.
    pub fn from_view(&self, v: &Point3) -> Option<Point3> {
        normalize(&self.unproject(&Point4::new(v.x, v.y, v.z, 1.0)))
    }

    /// Column `index` of the inverse matrix; column 2 encodes the eye
    /// point (perspective) or view direction (parallel).
    pub fn inverse_column(&self, index: usize) -> Point4 {
        self.inverse.column(index).into_owned()
    }

    /// Direction of sight through `local_point`, pointing away from the eye.
    pub fn boresite(&self, local_point: &Point3) -> Option<Vec3> {
        let eye = self.inverse_column(2);
        let mut direction = Vec3::new(eye.x, eye.y, eye.z);
        if eye.w.abs() > MIN_WEIGHT {
            direction = direction / eye.w - local_point.coords;
        }
        let length = direction.norm();
        if length < MIN_WEIGHT {
            return None;
        }
        Some(-direction / length)
    }

    /// World length of one view pixel at `point` along view X.
    pub fn pixel_size_at(&self, point: &Point3) -> Option<f64> {
        let mut view = self.project(point);
        let base = self.unproject(&view);
        view.x += view.w;
        let shifted = self.unproject(&view);
        real_distance(&base, &shifted)
    }
}

impl Default for ViewMap {
    fn default() -> Self {
        Self::identity()
    }
}

fn normalize(v: &Point4) -> Option<Point3> {
    if v.w.abs() < MIN_WEIGHT {
        return None;
    }
    Some(Point3::new(v.x / v.w, v.y / v.w, v.z / v.w))
}

/// Distance between the normalized images of two homogeneous points.
pub fn real_distance(a: &Point4, b: &Point4) -> Option<f64> {
    Some((normalize(a)? - normalize(b)?).norm())
}

/// XY distance between the normalized images of two homogeneous points.
pub fn real_distance_xy(a: &Point4, b: &Point4) -> Option<f64> {
    let a = normalize(a)?;
    let b = normalize(b)?;
    Some((a.x - b.x).hypot(a.y - b.y))
}
