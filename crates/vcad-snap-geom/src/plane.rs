//! Planes, rays and planar polygon helpers.

use vcad_snap_math::{Dir3, Point2, Point3, Vec3};

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(n.as_ref().cross(&arbitrary).cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// The 3D point at plane coordinates `uv`.
    pub fn point_at(&self, uv: &Point2) -> Point3 {
        self.origin + self.x_dir.as_ref() * uv.x + self.y_dir.as_ref() * uv.y
    }

    /// Foot of the perpendicular from `p`.
    pub fn project_point(&self, p: &Point3) -> Point3 {
        p - self.normal_dir.as_ref() * self.signed_distance(p)
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }
}

/// A ray with origin and unit direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray3 {
    /// Ray origin.
    pub origin: Point3,
    /// Unit direction.
    pub direction: Dir3,
}

impl Ray3 {
    /// Create a ray. The direction is normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: Dir3::new_normalize(direction),
        }
    }

    /// Point at parameter `t`.
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.direction.as_ref() * t
    }

    /// Parameter and point where the line of the ray crosses `plane`.
    pub fn intersect_plane(&self, plane: &Plane) -> Option<(f64, Point3)> {
        let denom = self.direction.dot(plane.normal_dir.as_ref());
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = -plane.signed_distance(&self.origin) / denom;
        Some((t, self.at(t)))
    }
}

/// Newell's method area vector of a (possibly non-planar) polygon; its
/// length is twice the projected area.
pub fn newell_normal(points: &[Point3]) -> Vec3 {
    let mut n = Vec3::zeros();
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

/// Signed area and area centroid of a closed 2D polygon.
pub fn polygon_area_centroid(points: &[Point2]) -> (f64, Point2) {
    let mut area2 = 0.0;
    let (mut cx, mut cy) = (0.0, 0.0);
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        let cross = a.x * b.y - b.x * a.y;
        area2 += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    if area2.abs() < 1e-300 {
        return (0.0, points.first().copied().unwrap_or_else(Point2::origin));
    }
    (0.5 * area2, Point2::new(cx / (3.0 * area2), cy / (3.0 * area2)))
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(p: &Point2, polygon: &[Point2]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[(i + n - 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ]
    }

    #[test]
    fn test_plane_from_normal_is_orthonormal() {
        let p = Plane::from_normal(Point3::origin(), Vec3::new(0.0, 0.0, 3.0));
        assert!(p.x_dir.dot(p.y_dir.as_ref()).abs() < 1e-12);
        assert!((p.x_dir.cross(p.y_dir.as_ref()) - Vec3::z()).norm() < 1e-12);
        let q = Point3::new(1.0, 2.0, 5.0);
        assert!((p.signed_distance(&q) - 5.0).abs() < 1e-12);
        assert!((p.point_at(&p.project(&q)) - p.project_point(&q)).norm() < 1e-12);
    }

    #[test]
    fn test_ray_plane() {
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 1.0), Vec3::z());
        let ray = Ray3::new(Point3::new(3.0, 4.0, 10.0), -Vec3::z());
        let (t, p) = ray.intersect_plane(&plane).unwrap();
        assert!((t - 9.0).abs() < 1e-12);
        assert!((p - Point3::new(3.0, 4.0, 1.0)).norm() < 1e-12);
        let parallel = Ray3::new(Point3::origin(), Vec3::x());
        assert!(parallel.intersect_plane(&plane).is_none());
    }

    #[test]
    fn test_polygon_area_centroid() {
        let (area, c) = polygon_area_centroid(&unit_square());
        assert!((area - 4.0).abs() < 1e-12);
        assert!((c - Point2::new(1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = unit_square();
        assert!(point_in_polygon(&Point2::new(1.0, 1.0), &sq));
        assert!(!point_in_polygon(&Point2::new(3.0, 1.0), &sq));
    }

    #[test]
    fn test_newell_normal() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let n = newell_normal(&pts);
        assert!((n - Vec3::new(0.0, 0.0, 2.0)).norm() < 1e-12);
    }
}
