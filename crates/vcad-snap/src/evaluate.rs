//! Turning the closest feature into a snap point for one mode.

use std::f64::consts::FRAC_PI_2;

use vcad_snap_geom::{CurveCollection, CurvePrimitive, Ellipse3, FaceGeometry, Ray3};
use vcad_snap_math::{real_distance_xy, Point3, Vec3};

use crate::geometry::{GeometricPrimitive, HitGeomType, HitParentGeomType};
use crate::kernel::SolidKernel;
use crate::request::SnapMode;
use crate::settings::SnapSettings;
use crate::tracker::TrackedHit;

/// A snap point in the coordinates of the hit entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SnapLocation {
    pub point: Point3,
    pub geom_type: HitGeomType,
    /// Curve to report; dropped when the snap is on a face interior or a
    /// whole-collection centroid.
    pub curve: Option<CurvePrimitive>,
    /// Unit normal, when one is defined.
    pub normal: Option<Vec3>,
}

/// Evaluates snap modes against one tracked hit.
pub(crate) struct Evaluator<'a> {
    pub hit: &'a TrackedHit,
    pub kernel: &'a dyn SolidKernel,
    pub settings: &'a SnapSettings,
    pub divisor: u32,
    pub aperture: f64,
    /// Nearest and keypoint snaps jump to the center of large arcs.
    pub find_arc_centers: bool,
}

impl Evaluator<'_> {
    /// Snap location for `mode`, or `None` when the mode does not apply.
    pub fn evaluate(&self, mode: SnapMode) -> Option<SnapLocation> {
        let mode = match mode {
            SnapMode::Intersection => SnapMode::Nearest,
            other => other,
        };
        let mut snap = self.evaluate_curve(mode)?;
        if !self.evaluate_interior(mode, &mut snap) {
            snap.normal = self.default_normal();
        }
        Some(snap)
    }

    fn evaluate_curve(&self, mode: SnapMode) -> Option<SnapLocation> {
        let feature = &self.hit.feature;
        let mut snap = SnapLocation {
            point: feature.location.point,
            geom_type: feature.geom_type,
            curve: feature.curve.clone(),
            normal: None,
        };
        let Some(curve) = feature.curve.as_ref() else {
            return (mode == SnapMode::Nearest || feature.geom_type == HitGeomType::Point)
                .then_some(snap);
        };

        // Text boxes have no meaningful bisector or start point.
        let mode = if feature.parent_type == HitParentGeomType::Text {
            match mode {
                SnapMode::Nearest => SnapMode::NearestKeypoint,
                SnapMode::MidPoint | SnapMode::Bisector => SnapMode::Center,
                SnapMode::NearestKeypoint => SnapMode::Origin,
                other => other,
            }
        } else {
            mode
        };

        match mode {
            SnapMode::Nearest | SnapMode::Intersection => {
                self.evaluate_arc_center(curve, mode, &mut snap);
            }
            SnapMode::Origin => snap.point = curve.start_point()?,
            SnapMode::MidPoint => {
                let point = self.mid_point(curve, mode, &mut snap)?;
                snap.point = point;
            }
            SnapMode::Bisector => snap.point = bisector(curve)?,
            SnapMode::Center => self.center(curve, &mut snap)?,
            SnapMode::NearestKeypoint => {
                if !self.evaluate_arc_center(curve, mode, &mut snap) {
                    snap.point = self.keypoint(curve)?;
                }
            }
        }
        Some(snap)
    }

    fn mid_point(&self, curve: &CurvePrimitive, mode: SnapMode, snap: &mut SnapLocation) -> Option<Point3> {
        match curve {
            CurvePrimitive::Line(segment) => Some(segment.midpoint()),
            CurvePrimitive::LineString(line_string) => Some(
                line_string
                    .segment(self.hit.feature.location.component_index)?
                    .midpoint(),
            ),
            CurvePrimitive::Arc(arc) => {
                if self.evaluate_arc_center(curve, mode, snap) {
                    Some(snap.point)
                } else {
                    Some(arc.fraction_to_point(0.5))
                }
            }
            CurvePrimitive::BSpline(_) => bisector(curve),
        }
    }

    fn center(&self, curve: &CurvePrimitive, snap: &mut SnapLocation) -> Option<()> {
        if let (false, GeometricPrimitive::CurveCollection(curves)) =
            (matches!(curve, CurvePrimitive::Arc(_)), self.hit.geometry.as_ref())
        {
            let is_region = curves.is_any_region();
            snap.point = if is_region && curves.plane(&Vec3::z()).is_some() {
                curves.area_centroid().map(|(centroid, _, _)| centroid)?
            } else {
                curves.wire_centroid()?
            };
            if curves.single_primitive().is_none() {
                if is_region {
                    snap.geom_type = HitGeomType::Surface;
                }
                snap.curve = None;
            }
            return Some(());
        }

        snap.point = match curve {
            CurvePrimitive::Arc(arc) => arc.center,
            _ if curve.is_physically_closed() => {
                match CurveCollection::outer(vec![curve.clone()]).area_centroid() {
                    Some((centroid, _, _)) => centroid,
                    None => curve.wire_centroid()?.0,
                }
            }
            _ => curve.wire_centroid()?.0,
        };
        Some(())
    }

    fn keypoint(&self, curve: &CurvePrimitive) -> Option<Point3> {
        let location = &self.hit.feature.location;
        let divisor = f64::from(self.divisor);
        let snap_fraction = |fraction: f64| (fraction * divisor + 0.5).floor() / divisor;
        match curve {
            CurvePrimitive::Line(segment) => {
                Some(segment.fraction_to_point(snap_fraction(location.component_fraction)))
            }
            CurvePrimitive::LineString(line_string) => Some(
                line_string
                    .segment(location.component_index)?
                    .fraction_to_point(snap_fraction(location.component_fraction)),
            ),
            _ => self.parameter_keypoint(curve),
        }
    }

    /// Keypoint at equal arc-length steps; closed curves get twice as many.
    fn parameter_keypoint(&self, curve: &CurvePrimitive) -> Option<Point3> {
        let length = curve.length()?;
        if length <= 0.0 {
            return Some(self.hit.feature.location.point);
        }
        let along = curve.length_between(0.0, self.hit.feature.location.fraction)?;
        let mut divisor = f64::from(self.divisor);
        if curve.is_physically_closed() {
            divisor *= 2.0;
        }
        let step = (along / length * divisor + 0.5).floor();
        Some(curve.point_at_distance(step / divisor * length)?.point)
    }

    /// Snap to the center of an arc sweeping at least a quarter turn when
    /// the pick is near it.
    fn evaluate_arc_center(&self, curve: &CurvePrimitive, mode: SnapMode, snap: &mut SnapLocation) -> bool {
        if !self.find_arc_centers {
            return false;
        }
        let CurvePrimitive::Arc(arc) = curve else {
            return false;
        };
        if arc.sweep.abs() < FRAC_PI_2 {
            return false;
        }
        if !self.near_arc_center(arc, mode) {
            return false;
        }
        snap.geom_type = HitGeomType::Point;
        snap.point = arc.center;
        true
    }

    fn near_arc_center(&self, arc: &Ellipse3, mode: SnapMode) -> bool {
        let feature = &self.hit.feature;
        let on_face = matches!(
            feature.parent_type,
            HitParentGeomType::Sheet | HitParentGeomType::Solid
        );
        if mode == SnapMode::NearestKeypoint && on_face {
            return (feature.close_point_local - arc.center).norm() <= 0.25 * arc.min_radius();
        }
        let view = &self.hit.local_view;
        real_distance_xy(&view.project(&feature.close_point_local), &view.project(&arc.center))
            .is_some_and(|distance| distance <= self.aperture)
    }

    /// Move an interior snap onto the face under the pick and attach the
    /// face normal. False when the hit has no interior or it could not be
    /// evaluated.
    fn evaluate_interior(&self, mode: SnapMode, snap: &mut SnapLocation) -> bool {
        let feature = &self.hit.feature;
        if !feature.check_interior {
            return false;
        }
        let interior = snap.geom_type != HitGeomType::Point
            && mode == SnapMode::Nearest
            && self.hit.distance_view > self.aperture;
        let local_point = if interior {
            feature.close_point_local
        } else {
            snap.point
        };
        let Some((point, normal)) = self.face_point(mode, snap, &local_point) else {
            return false;
        };
        snap.normal = normal;
        if interior {
            snap.point = point;
            snap.geom_type = HitGeomType::Surface;
            snap.curve = None;
        }
        true
    }

    /// Point and normal on the face under `local_point`.
    fn face_point(
        &self,
        mode: SnapMode,
        snap: &SnapLocation,
        local_point: &Point3,
    ) -> Option<(Point3, Option<Vec3>)> {
        let feature = &self.hit.feature;
        let view = &self.hit.local_view;
        let use_curve_point = snap.geom_type == HitGeomType::Point || mode == SnapMode::Center;
        let test_point = if use_curve_point {
            snap.point
        } else {
            feature.close_point_local
        };
        let tolerance = self.settings.on_surface_tolerance;

        match self.hit.geometry.as_ref() {
            GeometricPrimitive::CurveCollection(curves) if curves.is_any_region() => {
                pierce(curves, local_point, &view.boresite(local_point)?)
            }
            GeometricPrimitive::Solid(solid) => {
                let location = solid.closest_point(&test_point)?;
                if use_curve_point && (location.point - test_point).norm() > tolerance {
                    return None;
                }
                // Prefer the face in front when the point is on an edge.
                let mut face = location.face;
                if let Some(direction) = view.boresite(&location.point) {
                    let probe = location.point - direction * self.settings.probe_offset;
                    if let Some(front) = solid.closest_point(&probe) {
                        face = front.face;
                    }
                }
                match solid.face(face)? {
                    FaceGeometry::Region(region) => {
                        pierce(&region, local_point, &view.boresite(local_point)?)
                    }
                    FaceGeometry::Solid(single) => {
                        let on_face = single.closest_point(local_point)?;
                        Some((on_face.point, Some(on_face.normal?)))
                    }
                }
            }
            GeometricPrimitive::Surface(surface) => {
                let location = surface.closest_point(local_point)?;
                Some((location.point, location.normal))
            }
            GeometricPrimitive::Mesh(mesh) => {
                let toward = feature.close_point_local - local_point;
                let test = match toward.try_normalize(1e-30) {
                    Some(unit) => local_point + unit * self.settings.probe_offset,
                    None => *local_point,
                };
                let location = mesh.closest_facet(&test)?;
                let facet = mesh.facets().nth(location.facet)?;
                Some((location.point, mesh.facet_normal(&facet)))
            }
            GeometricPrimitive::BRep(_) => {
                let entity = self.hit.brep.as_deref()?;
                let view_z = -view.boresite(&test_point)?;
                let (point, normal) =
                    self.kernel
                        .evaluate_interior(entity, local_point, &test_point, &view_z)?;
                if use_curve_point && (point - test_point).norm() > tolerance {
                    return None;
                }
                Some((point, Some(normal)))
            }
            _ => None,
        }
    }

    /// Plane normal of planar wire geometry.
    fn default_normal(&self) -> Option<Vec3> {
        let feature = &self.hit.feature;
        if feature.parent_type != HitParentGeomType::Wire {
            return None;
        }
        let plane = match self.hit.geometry.as_ref() {
            GeometricPrimitive::CurveCollection(curves) => curves.plane(&Vec3::z()),
            _ => CurveCollection::open(vec![feature.curve.clone()?]).plane(&Vec3::z()),
        }?;
        Some(plane.normal_dir.into_inner())
    }
}

fn bisector(curve: &CurvePrimitive) -> Option<Point3> {
    Some(curve.point_at_distance(curve.length()? / 2.0)?.point)
}

fn pierce(region: &CurveCollection, origin: &Point3, direction: &Vec3) -> Option<(Point3, Option<Vec3>)> {
    let hit = region.ray_pierce(&Ray3::new(*origin, *direction))?;
    Some((hit.point, Some(hit.plane.normal_dir.into_inner())))
}
