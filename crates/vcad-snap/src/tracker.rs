//! Closest-feature search over a geometry stream.
//!
//! Walks an object's entries (expanding parts one level deep), reduces each
//! primitive to candidate curves near the pick and keeps the closest one
//! together with the entry that produced it.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use vcad_snap_geom::{
    BSplineSurface, CurveCollection, CurveLocation, CurvePrimitive, FaceGeometry, Polyface,
    SolidPrimitive, WireGeometry,
};
use vcad_snap_math::{points_almost_equal, real_distance_xy, Point3, Range3, Transform, ViewMap};

use crate::cache::ElementGeometryCache;
use crate::cancel::{CancelToken, Cancelled};
use crate::filter::{outside_range, EntryFilter};
use crate::geometry::{
    BRepData, CurveId, GeometricPrimitive, GeometryParams, HitGeomType, HitParentGeomType,
};
use crate::kernel::{BRepEntity, SolidKernel};
use crate::request::SnapStatus;
use crate::settings::SnapSettings;
use crate::stream::{EntryGeometry, EntryId, GeometryPart, GeometryProvider, GeometryStream};

/// Request-wide inputs shared by every stream walk.
pub(crate) struct WalkContext<'a> {
    pub settings: &'a SnapSettings,
    pub kernel: &'a dyn SolidKernel,
    pub cancel: &'a CancelToken,
    /// World to view.
    pub view: &'a ViewMap,
    /// Pick location, world coordinates.
    pub close_point: Point3,
    pub divisor: u32,
    /// Entries whose range is farther than this from the pick are skipped.
    pub max_outside: f64,
}

impl<'a> WalkContext<'a> {
    pub fn new(
        settings: &'a SnapSettings,
        kernel: &'a dyn SolidKernel,
        cancel: &'a CancelToken,
        view: &'a ViewMap,
        close_point: Point3,
        divisor: u32,
        aperture: f64,
    ) -> Self {
        let max_outside = view
            .pixel_size_at(&close_point)
            .map_or(f64::INFINITY, |pixel| pixel * aperture);
        Self {
            settings,
            kernel,
            cancel,
            view,
            close_point,
            divisor,
            max_outside,
        }
    }
}

/// The closest curve found so far, in the coordinates of its entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveFeature {
    /// Curve to snap along; `None` for isolated points.
    pub curve: Option<CurvePrimitive>,
    /// Topological id supplied by a solid kernel.
    pub curve_id: Option<CurveId>,
    /// Closest location on the curve.
    pub location: CurveLocation,
    pub geom_type: HitGeomType,
    pub parent_type: HitParentGeomType,
    /// The pick, or the surface point under it when the primitive has an
    /// interior.
    pub close_point_local: Point3,
    /// Distance used to compare features with interiors.
    pub distance_local: f64,
    /// Whether the primitive has an interior the pick may be on.
    pub check_interior: bool,
}

/// Where the winning feature came from.
#[derive(Debug, Clone)]
struct HitSource {
    geometry: Arc<GeometricPrimitive>,
    brep: Option<Arc<dyn BRepEntity>>,
    params: GeometryParams,
    entry_id: EntryId,
    local_to_world: Transform,
}

/// Result of a successful walk.
#[derive(Debug, Clone)]
pub struct TrackedHit {
    pub feature: CurveFeature,
    /// Primitive holding the feature.
    pub geometry: Arc<GeometricPrimitive>,
    /// Decoded body when the primitive is a BRep.
    pub brep: Option<Arc<dyn BRepEntity>>,
    pub params: GeometryParams,
    pub entry_id: EntryId,
    pub local_to_world: Transform,
    /// Entry coordinates to view.
    pub local_view: ViewMap,
    /// View XY distance between the pick and the curve point.
    pub distance_view: f64,
}

impl TrackedHit {
    /// The point under the cursor in world coordinates.
    ///
    /// The curve point unless the pick was well inside an interior, in
    /// which case the surface point under the pick.
    pub fn hit_point_world(&self, aperture: f64) -> Point3 {
        let feature = &self.feature;
        let local = if !feature.check_interior
            || feature.geom_type == HitGeomType::Point
            || self.distance_view <= aperture
        {
            feature.location.point
        } else {
            feature.close_point_local
        };
        self.local_to_world.apply_point(&local)
    }
}

/// Reduces primitives to candidate curves and keeps the closest.
struct Collector<'a> {
    ctx: &'a WalkContext<'a>,
    local_point: Point3,
    local_to_world: Transform,
    corrected: Option<Point3>,
    best: Option<CurveFeature>,
}

impl<'a> Collector<'a> {
    fn new(ctx: &'a WalkContext<'a>) -> Self {
        Self {
            ctx,
            local_point: ctx.close_point,
            local_to_world: Transform::identity(),
            corrected: None,
            best: None,
        }
    }

    fn update_if_closer(
        &mut self,
        curve: Option<&CurvePrimitive>,
        location: CurveLocation,
        geom_type: HitGeomType,
        parent_type: HitParentGeomType,
        curve_id: Option<CurveId>,
    ) -> bool {
        let check_interior = self.corrected.is_some();
        let distance_local = match self.corrected {
            Some(corrected) => (self.local_point - corrected).norm(),
            None => location.distance,
        };
        let closer = match &self.best {
            None => true,
            Some(best) => {
                ((check_interior || best.check_interior) && distance_local < best.distance_local)
                    || location.distance < best.location.distance
            }
        };
        if !closer {
            return false;
        }
        self.best = Some(CurveFeature {
            curve: curve.cloned(),
            curve_id,
            location,
            geom_type,
            parent_type,
            close_point_local: self.corrected.unwrap_or(self.local_point),
            distance_local,
            check_interior,
        });
        true
    }

    fn process_curve(
        &mut self,
        curve: &CurvePrimitive,
        geom_type: HitGeomType,
        parent_type: HitParentGeomType,
    ) -> bool {
        match curve.closest_point_bounded(&self.local_point) {
            Some(location) => {
                self.update_if_closer(Some(curve), location, geom_type, parent_type, None)
            }
            None => false,
        }
    }

    fn process_collection(
        &mut self,
        curves: &CurveCollection,
        geom_type: HitGeomType,
        parent_type: HitParentGeomType,
    ) -> bool {
        let mut accepted = false;
        for curve in curves.primitives() {
            accepted |= self.process_curve(curve, geom_type, parent_type);
        }
        accepted
    }

    /// Feed one primitive placed by `local_to_world`; true when it holds the
    /// new closest feature.
    fn process_geometry(
        &mut self,
        geometry: &GeometricPrimitive,
        brep: Option<&dyn BRepEntity>,
        local_to_world: &Transform,
    ) -> Result<bool, Cancelled> {
        let Some(world_to_local) = local_to_world.inverse() else {
            return Ok(false);
        };
        self.local_point = world_to_local.apply_point(&self.ctx.close_point);
        self.local_to_world = local_to_world.clone();
        self.corrected = None;

        let accepted = match geometry {
            GeometricPrimitive::Curve(curve) => {
                self.process_curve(curve, HitGeomType::None, HitParentGeomType::Wire)
            }
            GeometricPrimitive::PointString(points) => match points.closest_point(&self.local_point) {
                Some(location) => self.update_if_closer(
                    None,
                    location,
                    HitGeomType::Point,
                    HitParentGeomType::None,
                    None,
                ),
                None => false,
            },
            GeometricPrimitive::CurveCollection(curves) => {
                let parent = if curves.is_any_region() {
                    self.corrected = curves.closest_curve_or_region_point(&self.local_point);
                    HitParentGeomType::Sheet
                } else {
                    HitParentGeomType::Wire
                };
                self.process_collection(curves, HitGeomType::None, parent)
            }
            GeometricPrimitive::Solid(solid) => self.process_solid(solid)?,
            GeometricPrimitive::Surface(surface) => self.process_surface(surface),
            GeometricPrimitive::Mesh(mesh) => self.process_mesh(mesh)?,
            GeometricPrimitive::BRep(_) => match brep {
                Some(entity) => self.process_brep(entity),
                None => false,
            },
            GeometricPrimitive::Text(text) => match text.bounding_shape() {
                Some(shape) => {
                    self.process_collection(&shape, HitGeomType::None, HitParentGeomType::Text)
                }
                None => false,
            },
            GeometricPrimitive::Image(image) => self.process_collection(
                &image.outline(),
                HitGeomType::Surface,
                HitParentGeomType::None,
            ),
        };
        Ok(accepted)
    }

    fn process_solid(&mut self, solid: &SolidPrimitive) -> Result<bool, Cancelled> {
        let parent = if solid.is_capped() {
            HitParentGeomType::Solid
        } else {
            HitParentGeomType::Sheet
        };
        if solid.faces().len() < 2 {
            self.corrected = solid.closest_point(&self.local_point).map(|loc| loc.point);
            return self.process_single_face(solid, parent);
        }

        let Some(location) = solid.closest_point(&self.local_point) else {
            return Ok(false);
        };
        self.corrected = Some(location.point);
        match solid.face(location.face) {
            Some(FaceGeometry::Region(region)) => {
                Ok(self.process_collection(&region, HitGeomType::None, parent))
            }
            Some(FaceGeometry::Solid(face)) => self.process_single_face(&face, parent),
            None => Ok(false),
        }
    }

    fn process_single_face(
        &mut self,
        solid: &SolidPrimitive,
        parent: HitParentGeomType,
    ) -> Result<bool, Cancelled> {
        let view_dir = self
            .ctx
            .view
            .with_local(&self.local_to_world)
            .and_then(|view| view.boresite(&self.local_point));
        let mut accepted = false;
        for member in solid.single_face_wireframe(self.ctx.divisor, view_dir.as_ref()) {
            self.ctx.cancel.check()?;
            let geom_type = if member.is_edge {
                HitGeomType::None
            } else {
                HitGeomType::Surface
            };
            accepted |= match &member.geometry {
                WireGeometry::Curve(curve) => self.process_curve(curve, geom_type, parent),
                WireGeometry::Curves(curves) => self.process_collection(curves, geom_type, parent),
            };
        }
        Ok(accepted)
    }

    fn process_surface(&mut self, surface: &BSplineSurface) -> bool {
        let parent = HitParentGeomType::Sheet;
        let mut accepted = false;
        if !(surface.closed_u && surface.closed_v) {
            let boundary = CurveCollection::open(
                surface
                    .boundary_curves()
                    .into_iter()
                    .map(CurvePrimitive::BSpline)
                    .collect(),
            );
            accepted |= self.process_collection(&boundary, HitGeomType::None, parent);
        }

        let Some(location) = surface.closest_point(&self.local_point) else {
            return accepted;
        };
        self.corrected = Some(location.point);

        let base = f64::from(self.ctx.divisor);
        let key = |fraction: f64, closed: bool| {
            let divisor = if closed { 2.0 * base } else { base };
            (fraction * divisor + 0.5).floor() / divisor
        };
        let interior = |key: f64, closed: bool| closed || (key > 1e-10 && key < 1.0 - 1e-10);

        let key_u = key(location.u, surface.closed_u);
        if interior(key_u, surface.closed_u) {
            if let Some(curve) = surface.curve_at_u(key_u) {
                accepted |=
                    self.process_curve(&CurvePrimitive::BSpline(curve), HitGeomType::Surface, parent);
            }
        }
        let key_v = key(location.v, surface.closed_v);
        if interior(key_v, surface.closed_v) {
            if let Some(curve) = surface.curve_at_v(key_v) {
                accepted |=
                    self.process_curve(&CurvePrimitive::BSpline(curve), HitGeomType::Surface, parent);
            }
        }
        accepted
    }

    fn process_mesh(&mut self, mesh: &Polyface) -> Result<bool, Cancelled> {
        let interval = self.ctx.settings.cancel_interval;
        let mut reads = 0usize;
        let mut nearest: Option<(usize, Point3, f64)> = None;
        for (index, facet) in mesh.facets().enumerate() {
            reads += facet.reads;
            if reads >= interval {
                reads = 0;
                self.ctx.cancel.check()?;
            }
            let Some(point) = mesh.facet_closest_point(&facet, &self.local_point) else {
                continue;
            };
            let distance = (point - self.local_point).norm();
            if nearest.map_or(true, |(_, _, d)| distance < d) {
                nearest = Some((index, point, distance));
            }
        }
        let Some((seed, point, _)) = nearest else {
            return Ok(false);
        };
        self.corrected = Some(point);

        let face = mesh.connected_across_hidden_edges(seed);
        let mut accepted = false;
        for edge in mesh.visible_edges(&face) {
            accepted |=
                self.process_curve(&CurvePrimitive::Line(edge), HitGeomType::None, HitParentGeomType::Mesh);
        }
        Ok(accepted)
    }

    fn process_brep(&mut self, entity: &dyn BRepEntity) -> bool {
        let Some(features) =
            self.ctx
                .kernel
                .snap_features(entity, &self.local_point, self.ctx.divisor)
        else {
            return false;
        };
        self.corrected = features.surface_point;
        let mut accepted = false;
        for candidate in &features.curves {
            if let Some(location) = candidate.curve.closest_point_bounded(&self.local_point) {
                accepted |= self.update_if_closer(
                    Some(&candidate.curve),
                    location,
                    candidate.geom_type,
                    features.parent,
                    candidate.curve_id,
                );
            }
        }
        accepted
    }
}

/// Where a stream comes from.
pub(crate) struct WalkSource<'s> {
    pub stream: &'s GeometryStream,
    /// Stream coordinates to world.
    pub placement: &'s Transform,
    /// Cache of the owning object; inline geometry has none.
    pub owner: Option<Arc<ElementGeometryCache>>,
}

struct StreamWalk<'a> {
    collector: Collector<'a>,
    provider: &'a dyn GeometryProvider,
    filter: &'a EntryFilter,
    source: Option<HitSource>,
}

impl StreamWalk<'_> {
    fn outside(&self, range: Option<Range3>, local_to_world: &Transform) -> bool {
        let (Some(range), Some(world_to_local)) = (range, local_to_world.inverse()) else {
            return false;
        };
        let local = world_to_local.apply_point(&self.collector.ctx.close_point);
        outside_range(&range, &local, self.collector.ctx.max_outside)
    }

    fn walk(
        &mut self,
        stream: &GeometryStream,
        placement: &Transform,
        owner: Option<&ElementGeometryCache>,
    ) -> Result<(), Cancelled> {
        let prefiltered = self.filter.is_prefiltered();
        let check_range = owner.is_some() && !prefiltered;
        for (index, entry) in stream.entries.iter().enumerate() {
            let Ok(index) = u16::try_from(index) else {
                warn!(entries = stream.entries.len(), "stream truncated at u16::MAX entries");
                break;
            };
            let local_to_world = placement.then(&entry.transform);
            match &entry.geometry {
                EntryGeometry::Primitive(geometry) => {
                    let id = EntryId::element(index);
                    if self.filter.skips(&id, &entry.params)
                        || (check_range && self.outside(entry.range, &local_to_world))
                    {
                        continue;
                    }
                    let stop =
                        self.process_entry(geometry, entry.params, id, local_to_world, owner, check_range)?;
                    self.collector.ctx.cancel.check()?;
                    if stop {
                        return Ok(());
                    }
                }
                EntryGeometry::Part(part_id) => {
                    let id = EntryId {
                        index,
                        part_id: Some(*part_id),
                        part_index: 0,
                    };
                    if self.filter.skips_part(&id) {
                        continue;
                    }
                    let Some(part) = self.provider.part(*part_id) else {
                        debug!(part = %part_id, "skipping unknown geometry part");
                        continue;
                    };
                    if check_range && self.outside(entry.range.or(part.range), &local_to_world) {
                        continue;
                    }
                    let part_cache = self.provider.geometry_cache(*part_id);
                    self.walk_part(&part, id, &local_to_world, &part_cache, check_range)?;
                    if prefiltered {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk one part instance. A stop inside the part ends the part only;
    /// the outer stream keeps going.
    fn walk_part(
        &mut self,
        part: &GeometryPart,
        base: EntryId,
        placement: &Transform,
        part_cache: &ElementGeometryCache,
        check_range: bool,
    ) -> Result<(), Cancelled> {
        for (offset, entry) in part.stream.entries.iter().enumerate() {
            // Parts do not nest.
            let EntryGeometry::Primitive(geometry) = &entry.geometry else {
                continue;
            };
            let Ok(part_index) = u16::try_from(offset + 1) else {
                break;
            };
            let id = EntryId { part_index, ..base };
            if self.filter.skips(&id, &entry.params) {
                continue;
            }
            let local_to_world = placement.then(&entry.transform);
            if check_range {
                let range = entry.range.or_else(|| part_cache.range(part_index));
                if self.outside(range, &local_to_world) {
                    continue;
                }
            }
            let stop = self.process_entry(
                geometry,
                entry.params,
                id,
                local_to_world,
                Some(part_cache),
                check_range,
            )?;
            self.collector.ctx.cancel.check()?;
            if stop {
                break;
            }
        }
        Ok(())
    }

    /// Process one primitive; true when the walk should stop.
    fn process_entry(
        &mut self,
        geometry: &Arc<GeometricPrimitive>,
        params: GeometryParams,
        id: EntryId,
        local_to_world: Transform,
        cache: Option<&ElementGeometryCache>,
        check_range: bool,
    ) -> Result<bool, Cancelled> {
        let brep = match geometry.as_ref() {
            GeometricPrimitive::BRep(data) => match self.brep_entity(data, id, cache) {
                Some(entity) => Some(entity),
                None => return Ok(false),
            },
            _ => None,
        };

        if check_range {
            let range = brep.as_ref().map_or_else(|| geometry.range(), |entity| entity.range());
            if let (true, Some(cache)) = (id.in_part(), cache) {
                cache.insert_range(id.part_index, range);
            }
            if self.outside(Some(range), &local_to_world) {
                trace!(entry = id.index, part_index = id.part_index, "entry out of range");
                return Ok(false);
            }
        }

        let accepted =
            self.collector
                .process_geometry(geometry, brep.as_deref(), &local_to_world)?;
        if !accepted {
            return Ok(false);
        }
        self.source = Some(HitSource {
            geometry: geometry.clone(),
            brep,
            params,
            entry_id: id,
            local_to_world,
        });

        if self.filter.is_prefiltered() {
            return Ok(true);
        }
        let stop_distance = self.collector.ctx.settings.local_stop_distance;
        Ok(self
            .collector
            .best
            .as_ref()
            .is_some_and(|best| best.distance_local < stop_distance))
    }

    fn brep_entity(
        &self,
        data: &BRepData,
        id: EntryId,
        cache: Option<&ElementGeometryCache>,
    ) -> Option<Arc<dyn BRepEntity>> {
        let index = id.cache_index();
        if let Some(entity) = cache.and_then(|cache| cache.brep(index)) {
            return Some(entity);
        }
        match self.collector.ctx.kernel.decode(data) {
            Ok(entity) => {
                if let Some(cache) = cache {
                    cache.insert_brep(index, entity.clone());
                }
                Some(entity)
            }
            Err(err) => {
                warn!(entry = id.index, part_index = id.part_index, error = %err, "skipping brep");
                None
            }
        }
    }
}

/// Collapse degenerate curves to points and order-2 B-splines to
/// line strings.
fn simplify(feature: &mut CurveFeature) {
    let collapse = match &feature.curve {
        Some(CurvePrimitive::Line(segment)) => points_almost_equal(&segment.start, &segment.end),
        Some(CurvePrimitive::LineString(line_string)) => match line_string.points.as_slice() {
            [_] => true,
            [a, b] => points_almost_equal(a, b),
            _ => false,
        },
        Some(CurvePrimitive::BSpline(spline)) if spline.order() == 2 => {
            let mut points = spline.poles.clone();
            if spline.closed {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
            }
            let line_string = CurvePrimitive::line_string(points);
            if let Some(location) = line_string.closest_point_bounded(&feature.location.point) {
                feature.location = CurveLocation {
                    distance: feature.location.distance,
                    ..location
                };
            }
            feature.curve = Some(line_string);
            false
        }
        _ => false,
    };
    if collapse {
        feature.curve = None;
        feature.geom_type = HitGeomType::Point;
    }
}

/// Find the feature of `source` closest to the pick.
pub(crate) fn closest_curve(
    ctx: &WalkContext<'_>,
    provider: &dyn GeometryProvider,
    source: &WalkSource<'_>,
    filter: &EntryFilter,
) -> Result<TrackedHit, SnapStatus> {
    if source.stream.view_independent {
        return Err(SnapStatus::NotSnappable);
    }
    let mut walk = StreamWalk {
        collector: Collector::new(ctx),
        provider,
        filter,
        source: None,
    };
    walk.walk(source.stream, source.placement, source.owner.as_deref())
        .map_err(|Cancelled| SnapStatus::Aborted)?;

    let (Some(mut feature), Some(source)) = (walk.collector.best, walk.source) else {
        return Err(SnapStatus::NoSnapPossible);
    };
    simplify(&mut feature);
    if feature.curve.is_none() && feature.geom_type != HitGeomType::Point {
        return Err(SnapStatus::NoSnapPossible);
    }
    let local_view = ctx
        .view
        .with_local(&source.local_to_world)
        .ok_or(SnapStatus::NoSnapPossible)?;
    let distance_view = real_distance_xy(
        &local_view.project(&feature.close_point_local),
        &local_view.project(&feature.location.point),
    )
    .unwrap_or(f64::INFINITY);

    let hit = TrackedHit {
        feature,
        geometry: source.geometry,
        brep: source.brep,
        params: source.params,
        entry_id: source.entry_id,
        local_to_world: source.local_to_world,
        local_view,
        distance_view,
    };
    debug!(
        entry = hit.entry_id.index,
        part_index = hit.entry_id.part_index,
        kind = hit.geometry.kind_name(),
        distance = hit.feature.location.distance,
        "closest feature"
    );
    Ok(hit)
}
