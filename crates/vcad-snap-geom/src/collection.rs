//! Curve collections: open paths, closed loops and regions.

use serde::{Deserialize, Serialize};
use vcad_snap_math::{points_almost_equal, Point2, Point3, Range3, Transform, Vec3};

use crate::curve::{CurveLocation, CurvePrimitive};
use crate::plane::{newell_normal, point_in_polygon, polygon_area_centroid, Plane, Ray3};

/// Chords used when a loop is reduced to a polygon.
const LOOP_CHORDS: usize = 64;

/// How the members of a collection combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryType {
    /// Unstructured bag of curves.
    #[default]
    None,
    /// A single open path.
    Open,
    /// A closed loop bounding a region.
    Outer,
    /// A closed loop bounding a hole.
    Inner,
    /// Loops combined by even-odd parity.
    ParityRegion,
    /// Regions combined by union.
    UnionRegion,
}

/// A member of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurveMember {
    /// A leaf curve.
    Primitive(CurvePrimitive),
    /// A nested loop or region.
    Collection(CurveCollection),
}

/// An ordered collection of curves with a boundary interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveCollection {
    /// Boundary interpretation.
    #[serde(default)]
    pub boundary: BoundaryType,
    /// Members in order.
    pub members: Vec<CurveMember>,
}

/// Where a ray crosses a planar region.
#[derive(Debug, Clone)]
pub struct RegionPierce {
    /// Crossing point.
    pub point: Point3,
    /// Frame of the region plane.
    pub plane: Plane,
    /// True when the crossing is inside the region.
    pub inside: bool,
}

impl CurveCollection {
    /// Collection of primitives with the given boundary type.
    pub fn new(boundary: BoundaryType, primitives: Vec<CurvePrimitive>) -> Self {
        Self {
            boundary,
            members: primitives.into_iter().map(CurveMember::Primitive).collect(),
        }
    }

    /// Open path.
    pub fn open(primitives: Vec<CurvePrimitive>) -> Self {
        Self::new(BoundaryType::Open, primitives)
    }

    /// Single closed loop.
    pub fn outer(primitives: Vec<CurvePrimitive>) -> Self {
        Self::new(BoundaryType::Outer, primitives)
    }

    /// Parity region of loops; the first is the outer boundary.
    pub fn parity(loops: Vec<CurveCollection>) -> Self {
        Self {
            boundary: BoundaryType::ParityRegion,
            members: loops.into_iter().map(CurveMember::Collection).collect(),
        }
    }

    /// True for closed loops and regions.
    pub fn is_any_region(&self) -> bool {
        matches!(
            self.boundary,
            BoundaryType::Outer
                | BoundaryType::Inner
                | BoundaryType::ParityRegion
                | BoundaryType::UnionRegion
        )
    }

    /// All leaf primitives, depth first.
    pub fn primitives(&self) -> Vec<&CurvePrimitive> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a CurvePrimitive>) {
        for member in &self.members {
            match member {
                CurveMember::Primitive(p) => out.push(p),
                CurveMember::Collection(c) => c.collect_primitives(out),
            }
        }
    }

    /// The only primitive, when there is exactly one.
    pub fn single_primitive(&self) -> Option<&CurvePrimitive> {
        match self.primitives().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// True when `curve` is one of this collection's leaves.
    pub fn contains_primitive(&self, curve: &CurvePrimitive) -> bool {
        self.primitives().into_iter().any(|p| p == curve)
    }

    /// Primitive groups forming loops (or the single path).
    pub fn loops(&self) -> Vec<Vec<&CurvePrimitive>> {
        match self.boundary {
            BoundaryType::ParityRegion | BoundaryType::UnionRegion => self
                .members
                .iter()
                .map(|m| match m {
                    CurveMember::Primitive(p) => vec![p],
                    CurveMember::Collection(c) => c.primitives(),
                })
                .collect(),
            _ => vec![self.primitives()],
        }
    }

    fn loop_polygons(&self) -> Vec<Vec<Point3>> {
        self.loops()
            .into_iter()
            .map(|prims| {
                let mut pts: Vec<Point3> = Vec::new();
                for prim in prims {
                    for (_, p) in prim.stroke(LOOP_CHORDS) {
                        if pts.last().map_or(true, |q| !points_almost_equal(q, &p)) {
                            pts.push(p);
                        }
                    }
                }
                if pts.len() > 1 && points_almost_equal(&pts[0], &pts[pts.len() - 1]) {
                    pts.pop();
                }
                pts
            })
            .filter(|pts| !pts.is_empty())
            .collect()
    }

    /// The plane containing every curve; `default_normal` orients planes
    /// of collinear curves. `None` when the curves are not coplanar.
    pub fn plane(&self, default_normal: &Vec3) -> Option<Plane> {
        let polygons = self.loop_polygons();
        let points: Vec<Point3> = polygons.iter().flatten().copied().collect();
        let origin = *points.first()?;
        let range = Range3::from_points(points.iter());
        let size = (range.high - range.low).norm();

        let mut normal = Vec3::zeros();
        for poly in &polygons {
            let n = newell_normal(poly);
            if normal.dot(&n) < 0.0 {
                normal -= n;
            } else {
                normal += n;
            }
        }
        if normal.norm() <= 1e-12 * size.max(1.0) * size.max(1.0) {
            let direction = points
                .iter()
                .map(|p| p - origin)
                .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))
                .unwrap_or_else(Vec3::zeros);
            normal = match direction.try_normalize(1e-30) {
                Some(d) => default_normal - d * default_normal.dot(&d),
                None => *default_normal,
            };
            if normal.norm() < 1e-12 {
                normal = Plane::from_normal(origin, direction).y_dir.into_inner();
            }
        } else if normal.dot(default_normal) < 0.0 {
            normal = -normal;
        }

        let plane = Plane::from_normal(origin, normal);
        let tol = 1e-8 * size.max(1.0);
        points
            .iter()
            .all(|p| plane.signed_distance(p).abs() <= tol)
            .then_some(plane)
    }

    /// Even-odd (or union) containment in the region's plane.
    fn contains_projected(&self, plane: &Plane, p: &Point3) -> bool {
        let uv = plane.project(p);
        let polygons: Vec<Vec<Point2>> = self
            .loop_polygons()
            .iter()
            .map(|poly| poly.iter().map(|q| plane.project(q)).collect())
            .collect();
        match self.boundary {
            BoundaryType::UnionRegion => polygons.iter().any(|poly| point_in_polygon(&uv, poly)),
            _ => {
                polygons
                    .iter()
                    .filter(|poly| point_in_polygon(&uv, poly))
                    .count()
                    % 2
                    == 1
            }
        }
    }

    /// Closest point over every leaf, with the leaf that produced it.
    pub fn closest_point_bounded(&self, p: &Point3) -> Option<(&CurvePrimitive, CurveLocation)> {
        self.primitives()
            .into_iter()
            .filter_map(|prim| prim.closest_point_bounded(p).map(|loc| (prim, loc)))
            .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance))
    }

    /// For a planar region, the projection of `p` when it falls inside,
    /// otherwise the closest boundary point.
    pub fn closest_curve_or_region_point(&self, p: &Point3) -> Option<Point3> {
        let boundary = self.closest_point_bounded(p)?.1.point;
        if !self.is_any_region() {
            return Some(boundary);
        }
        let plane = match self.plane(&Vec3::z()) {
            Some(plane) => plane,
            None => return Some(boundary),
        };
        let foot = plane.project_point(p);
        if self.contains_projected(&plane, &foot) {
            Some(foot)
        } else {
            Some(boundary)
        }
    }

    /// Where the line of `ray` crosses the region's plane.
    pub fn ray_pierce(&self, ray: &Ray3) -> Option<RegionPierce> {
        let plane = self.plane(ray.direction.as_ref())?;
        let (_, point) = ray.intersect_plane(&plane)?;
        let inside = self.contains_projected(&plane, &point);
        Some(RegionPierce {
            point,
            plane,
            inside,
        })
    }

    /// Area centroid, unit normal and area of a planar region.
    pub fn area_centroid(&self) -> Option<(Point3, Vec3, f64)> {
        if !self.is_any_region() {
            return None;
        }
        let plane = self.plane(&Vec3::z())?;
        let mut area_sum = 0.0;
        let mut moment = nalgebra::Vector2::zeros();
        for (i, poly) in self.loop_polygons().iter().enumerate() {
            let uv: Vec<Point2> = poly.iter().map(|q| plane.project(q)).collect();
            let (area, centroid) = polygon_area_centroid(&uv);
            let sign = match self.boundary {
                BoundaryType::ParityRegion if i > 0 => -1.0,
                BoundaryType::Inner => -1.0,
                _ => 1.0,
            };
            let signed = sign * area.abs();
            area_sum += signed;
            moment += centroid.coords * signed;
        }
        if area_sum.abs() < 1e-300 {
            return None;
        }
        let centroid = plane.point_at(&Point2::from(moment / area_sum));
        Some((centroid, plane.normal_dir.into_inner(), area_sum.abs()))
    }

    /// Length-weighted centroid of all leaves.
    pub fn wire_centroid(&self) -> Option<Point3> {
        let mut weighted = Vec3::zeros();
        let mut total = 0.0;
        let mut fallback = None;
        for prim in self.primitives() {
            let (c, len) = prim.wire_centroid()?;
            fallback.get_or_insert(c);
            weighted += c.coords * len;
            total += len;
        }
        if total <= 0.0 {
            return fallback;
        }
        Some(Point3::from(weighted / total))
    }

    /// Start points of each primitive plus the open end, used for lateral
    /// edges of swept surfaces.
    pub fn break_points(&self) -> Vec<Point3> {
        let mut out: Vec<Point3> = Vec::new();
        for prims in self.loops() {
            for prim in &prims {
                match prim {
                    CurvePrimitive::LineString(ls) => out.extend(ls.points.iter().copied()),
                    other => out.extend(other.start_point()),
                }
            }
            if let Some(last) = prims.last().and_then(|p| p.end_point()) {
                out.push(last);
            }
        }
        out.dedup_by(|a, b| points_almost_equal(a, b));
        if self.is_any_region() && out.len() > 1 && points_almost_equal(&out[0], &out[out.len() - 1]) {
            out.pop();
        }
        out
    }

    /// Interior rule points on curved primitives: `divisor` steps, or
    /// `closed_divisor` for physically closed primitives.
    pub fn rule_points(&self, divisor: u32, closed_divisor: u32) -> Vec<Point3> {
        let mut out = Vec::new();
        for prim in self.primitives() {
            if matches!(prim, CurvePrimitive::Line(_) | CurvePrimitive::LineString(_)) {
                continue;
            }
            let n = if prim.is_physically_closed() {
                closed_divisor
            } else {
                divisor
            }
            .max(1);
            for k in 1..n {
                out.extend(prim.fraction_to_point(k as f64 / n as f64));
            }
        }
        out
    }

    /// Copy with every curve mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            boundary: self.boundary,
            members: self
                .members
                .iter()
                .map(|m| match m {
                    CurveMember::Primitive(p) => CurveMember::Primitive(p.transformed(t)),
                    CurveMember::Collection(c) => CurveMember::Collection(c.transformed(t)),
                })
                .collect(),
        }
    }

    /// Bounding range of all leaves.
    pub fn range(&self) -> Range3 {
        let mut range = Range3::null();
        for prim in self.primitives() {
            range.extend(&prim.range());
        }
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::Ellipse3;

    fn square(size: f64) -> CurveCollection {
        CurveCollection::outer(vec![CurvePrimitive::line_string(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(size, 0.0, 0.0),
            Point3::new(size, size, 0.0),
            Point3::new(0.0, size, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ])])
    }

    #[test]
    fn test_square_area_centroid() {
        let (c, n, area) = square(4.0).area_centroid().unwrap();
        assert!((c - Point3::new(2.0, 2.0, 0.0)).norm() < 1e-12);
        assert!((n - Vec3::z()).norm() < 1e-12);
        assert!((area - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_parity_region_with_hole() {
        let hole = CurveCollection::new(
            BoundaryType::Inner,
            vec![CurvePrimitive::line_string(vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
            ])],
        );
        let region = CurveCollection::parity(vec![square(4.0), hole]);
        let (c, _, area) = region.area_centroid().unwrap();
        assert!((area - 12.0).abs() < 1e-12);
        // (16 * 2 - 4 * 1) / 12
        assert!((c.x - 28.0 / 12.0).abs() < 1e-12);
        let inside_hole = region.closest_curve_or_region_point(&Point3::new(1.0, 0.5, 3.0)).unwrap();
        assert!((inside_hole - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        let in_material = region.closest_curve_or_region_point(&Point3::new(3.0, 3.0, 3.0)).unwrap();
        assert!((in_material - Point3::new(3.0, 3.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_ray_pierce() {
        let ray = Ray3::new(Point3::new(1.0, 1.0, 10.0), -Vec3::z());
        let hit = square(4.0).ray_pierce(&ray).unwrap();
        assert!(hit.inside);
        assert!((hit.point - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_open_line_plane_uses_default_normal() {
        let path = CurveCollection::open(vec![CurvePrimitive::line(
            Point3::origin(),
            Point3::new(5.0, 0.0, 0.0),
        )]);
        let plane = path.plane(&Vec3::z()).unwrap();
        assert!((plane.normal_dir.into_inner() - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_non_planar_rejected() {
        let bent = CurveCollection::outer(vec![CurvePrimitive::line_string(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ])]);
        assert!(bent.plane(&Vec3::z()).is_none());
        assert!(bent.area_centroid().is_none());
        assert!(bent.wire_centroid().is_some());
    }

    #[test]
    fn test_break_and_rule_points() {
        let disk = CurveCollection::outer(vec![CurvePrimitive::Arc(Ellipse3::circle_xy(
            Point3::origin(),
            1.0,
        ))]);
        assert_eq!(disk.break_points().len(), 1);
        assert_eq!(disk.rule_points(2, 4).len(), 3);
        assert_eq!(square(1.0).break_points().len(), 4);
    }

    #[test]
    fn test_collection_json_round_trip() {
        let json = serde_json::to_string(&square(1.0)).unwrap();
        let back: CurveCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, square(1.0));
    }
}
