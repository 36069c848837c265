#![warn(missing_docs)]

//! Math types for the vcad snap engine.
//!
//! Thin wrappers around nalgebra providing the coordinate types used by
//! snapping: points, vectors, directions, affine transforms, projective
//! view maps, bounding ranges and coordinate comparisons.

mod range;
mod view;

pub use range::Range3;
pub use view::{real_distance, real_distance_xy, Point4, ViewMap};

use nalgebra::{Matrix4, Unit, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D (plane or view) space.
pub type Point2 = nalgebra::Point2<f64>;

/// A 4x4 affine transformation matrix.
///
/// Serialized as the 16 matrix entries in column-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about an arbitrary axis through the origin by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        Self { matrix: m }
    }

    /// Rotation by `angle` radians about the line through `origin` along `axis`.
    pub fn rotation_about_line(origin: &Point3, axis: &Dir3, angle: f64) -> Self {
        let to_origin = Self::translation(-origin.x, -origin.y, -origin.z);
        let back = Self::translation(origin.x, origin.y, origin.z);
        back.then(&Self::rotation_about_axis(axis, angle))
            .then(&to_origin)
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a normal vector (uses inverse transpose of upper-left 3x3).
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        match m3.try_inverse() {
            Some(inv) => inv.transpose() * n,
            None => *n,
        }
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Relative comparison used for coordinate equality tests where absolute
/// magnitudes vary (closure of polylines, coincident poles).
pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-10 * (1.0 + a.abs().max(b.abs()))
}

/// Coordinate-wise [`almost_equal`] for points.
pub fn points_almost_equal(a: &Point3, b: &Point3) -> bool {
    almost_equal(a.x, b.x) && almost_equal(a.y, b.y) && almost_equal(a.z, b.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((result.x - 11.0).abs() < 1e-12);
        assert!((result.y - 22.0).abs() < 1e-12);
        assert!((result.z - 33.0).abs() < 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let scale = Transform::scale(2.0, 2.0, 2.0);
        let result = scale.then(&translate).apply_point(&Point3::origin());
        assert!((result.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse() {
        let t = Transform::translation(1.0, 2.0, 3.0);
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        let result = t.then(&inv).apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_about_line() {
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_line(&Point3::new(1.0, 0.0, 0.0), &axis, PI / 2.0);
        let result = t.apply_point(&Point3::new(2.0, 0.0, 0.0));
        approx::assert_abs_diff_eq!(result, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_turn_preserves_normals() {
        let t = Transform::rotation_about_axis(&Dir3::new_normalize(Vec3::z()), PI / 2.0);
        let n = t.apply_normal(&Vec3::x());
        assert!(n.x.abs() < 1e-12);
        assert!((n.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_json_is_column_major() {
        let t = Transform::translation(4.0, 5.0, 6.0);
        let json = serde_json::to_value(&t).unwrap();
        let values = json.as_array().unwrap();
        assert_eq!(values.len(), 16);
        assert_eq!(values[12].as_f64(), Some(4.0));
        let back: Transform = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_almost_equal_scales_with_magnitude() {
        assert!(almost_equal(1.0e6, 1.0e6 + 1.0e-5));
        assert!(!almost_equal(1.0, 1.0 + 1.0e-6));
        assert!(points_almost_equal(
            &Point3::new(3.0e4, 0.0, -2.0),
            &Point3::new(3.0e4 + 1.0e-8, 0.0, -2.0)
        ));
    }
}
