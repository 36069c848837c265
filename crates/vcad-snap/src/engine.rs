//! The snap engine: one request in, one response out.

use std::sync::Arc;

use tracing::{debug, trace};
use vcad_snap_math::{Point3, Transform};

use crate::cancel::{CancelToken, Cancelled};
use crate::evaluate::Evaluator;
use crate::filter::EntryFilter;
use crate::geometry::HitGeomType;
use crate::intersect::closest_intersection;
use crate::kernel::{NullKernel, SolidKernel};
use crate::rank::{SnapCandidate, SnapRanker};
use crate::request::{SnapMode, SnapRequest, SnapResponse, SnapStatus, SnapTarget};
use crate::settings::SnapSettings;
use crate::stream::{GeometricObject, GeometryProvider, GeometryStream};
use crate::tracker::{closest_curve, TrackedHit, WalkContext, WalkSource};

/// Resolves snap requests against the geometry of a [`GeometryProvider`].
///
/// The engine holds no per-request state, so one engine can serve any
/// number of requests, one at a time or from several threads.
pub struct SnapEngine {
    provider: Arc<dyn GeometryProvider>,
    kernel: Arc<dyn SolidKernel>,
    settings: SnapSettings,
}

/// A request target looked up in the provider.
enum Resolved<'r> {
    Object(Arc<GeometricObject>),
    Inline(&'r GeometryStream),
}

impl Resolved<'_> {
    fn stream(&self) -> &GeometryStream {
        match self {
            Self::Object(object) => &object.stream,
            Self::Inline(stream) => stream,
        }
    }

    fn placement(&self) -> Transform {
        match self {
            Self::Object(object) => object.placement.clone(),
            Self::Inline(_) => Transform::identity(),
        }
    }

    fn placement_origin(&self) -> Option<Point3> {
        match self {
            Self::Object(object) => object.placement_origin,
            Self::Inline(_) => None,
        }
    }
}

/// Request values after defaults are applied.
struct Scope<'a> {
    request: &'a SnapRequest,
    aperture: f64,
}

impl SnapEngine {
    /// Engine without a solid kernel; BRep entries are skipped.
    pub fn new(provider: Arc<dyn GeometryProvider>) -> Self {
        Self {
            provider,
            kernel: Arc::new(NullKernel),
            settings: SnapSettings::default(),
        }
    }

    /// Use `kernel` for BRep entries.
    pub fn with_kernel(mut self, kernel: Arc<dyn SolidKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    /// Replace the tunables.
    pub fn with_settings(mut self, settings: SnapSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SnapSettings {
        &self.settings
    }

    /// Resolve one request.
    ///
    /// Never fails outright: problems are reported through
    /// [`SnapResponse::status`](SnapResponse#structfield.status).
    pub fn snap(&self, request: &SnapRequest, cancel: &CancelToken) -> SnapResponse {
        let response = self
            .try_snap(request, cancel)
            .unwrap_or_else(SnapResponse::status);
        debug!(
            target_id = %request.target.id(),
            status = ?response.status,
            mode = ?response.snap_mode,
            heat = ?response.heat,
            "snap resolved"
        );
        response
    }

    fn try_snap(&self, request: &SnapRequest, cancel: &CancelToken) -> Result<SnapResponse, SnapStatus> {
        cancel.check().map_err(|Cancelled| SnapStatus::Aborted)?;
        if request.snap_modes.is_empty() {
            return Err(SnapStatus::BadArg);
        }
        let aperture = request.snap_aperture.unwrap_or(self.settings.aperture);
        let divisor = request.snap_divisor.unwrap_or(self.settings.divisor);
        if divisor == 0 || !(aperture > 0.0) {
            return Err(SnapStatus::BadArg);
        }
        let scope = Scope { request, aperture };

        let resolved = self.resolve(&request.target)?;
        let mut modes = request.snap_modes.clone();
        let origin = match resolved.placement_origin() {
            Some(origin) if modes.remove(&SnapMode::Origin) => Some(origin),
            _ => None,
        };
        if request.intersect_candidates.is_empty() {
            modes.remove(&SnapMode::Intersection);
        }

        let ctx = WalkContext::new(
            &self.settings,
            self.kernel.as_ref(),
            cancel,
            &request.world_to_view,
            request.close_point,
            divisor,
            aperture,
        );
        let mut ranker = SnapRanker::new(&request.world_to_view, request.test_point, aperture, &self.settings);
        let mut intersect_snap = None;

        match self.walk(&ctx, &resolved, &self.primary_filter(request, &resolved)) {
            Ok(hit) => {
                let evaluator = Evaluator {
                    hit: &hit,
                    kernel: self.kernel.as_ref(),
                    settings: &self.settings,
                    divisor,
                    aperture,
                    find_arc_centers: !request.snap_modes.contains(&SnapMode::Center),
                };
                for &mode in &modes {
                    cancel.check().map_err(|Cancelled| SnapStatus::Aborted)?;
                    let Some(candidate) = mode_candidate(&scope, &evaluator, mode) else {
                        trace!(?mode, "mode does not apply");
                        continue;
                    };
                    if mode == SnapMode::Intersection && candidate.curve.is_some() {
                        intersect_snap = Some(candidate);
                        continue;
                    }
                    trace!(?mode, heat = ?candidate.heat, distance = candidate.view_distance, "candidate");
                    if ranker.update_if_better(candidate) {
                        break;
                    }
                }
            }
            Err(SnapStatus::Aborted) => return Err(SnapStatus::Aborted),
            Err(status) if origin.is_none() => return Err(status),
            Err(status) => trace!(?status, "no geometry feature, trying placement origin"),
        }

        if let Some(origin) = origin {
            let mut candidate = SnapCandidate::new(SnapMode::Origin, origin);
            candidate.geom_type = HitGeomType::Point;
            if candidate.measure_heat(&request.close_point, &request.world_to_view, aperture, true) {
                ranker.update_if_better(candidate);
            }
        }

        if let Some(primary) = intersect_snap {
            if !ranker.best_in_range() {
                self.fold_intersections(&ctx, &scope, primary, &mut ranker)?;
            }
        }

        Ok(ranker.into_response())
    }

    fn resolve<'r>(&self, target: &'r SnapTarget) -> Result<Resolved<'r>, SnapStatus> {
        match target {
            SnapTarget::Object(id) => self.provider.object(*id).map(Resolved::Object).ok_or_else(|| {
                debug!(%id, "snap target not found");
                SnapStatus::BadArg
            }),
            SnapTarget::Geometry { stream, .. } => Ok(Resolved::Inline(stream)),
        }
    }

    /// Sub-category and class filters apply to stored objects only; a class
    /// filter needs a sub-category and replaces the view's class switches.
    fn primary_filter(&self, request: &SnapRequest, resolved: &Resolved<'_>) -> EntryFilter {
        let stored = matches!(resolved, Resolved::Object(_));
        let sub_category = request.sub_category.filter(|_| stored);
        let geometry_class = request.geometry_class.filter(|_| sub_category.is_some());
        EntryFilter {
            target: request.entry_id,
            sub_category,
            geometry_class,
            view_flags: geometry_class.is_none().then_some(request.view_flags),
        }
    }

    fn walk(
        &self,
        ctx: &WalkContext<'_>,
        resolved: &Resolved<'_>,
        filter: &EntryFilter,
    ) -> Result<TrackedHit, SnapStatus> {
        let placement = resolved.placement();
        let owner = match resolved {
            Resolved::Object(object) => Some(self.provider.geometry_cache(object.id)),
            Resolved::Inline(_) => None,
        };
        let source = WalkSource {
            stream: resolved.stream(),
            placement: &placement,
            owner,
        };
        closest_curve(ctx, self.provider.as_ref(), &source, filter)
    }

    /// Intersect the primary curve with each neighbor and fold every
    /// crossing into `ranker`.
    fn fold_intersections(
        &self,
        ctx: &WalkContext<'_>,
        scope: &Scope<'_>,
        primary: SnapCandidate,
        ranker: &mut SnapRanker<'_>,
    ) -> Result<(), SnapStatus> {
        let request = scope.request;
        let Some(curve) = primary.curve.as_ref() else {
            return Ok(());
        };
        let filter = EntryFilter {
            view_flags: Some(request.view_flags),
            ..EntryFilter::default()
        };
        for neighbor in &request.intersect_candidates {
            ctx.cancel.check().map_err(|Cancelled| SnapStatus::Aborted)?;
            let Ok(resolved) = self.resolve(neighbor) else {
                continue;
            };
            let hit = match self.walk(ctx, &resolved, &filter) {
                Ok(hit) => hit,
                Err(SnapStatus::Aborted) => return Err(SnapStatus::Aborted),
                Err(status) => {
                    trace!(neighbor = %neighbor.id(), ?status, "neighbor has no feature");
                    continue;
                }
            };
            let Some(neighbor_curve) = hit
                .feature
                .curve
                .as_ref()
                .map(|c| c.transformed(&hit.local_to_world))
            else {
                continue;
            };
            let Some(point) =
                closest_intersection(curve, &neighbor_curve, &request.close_point, &request.world_to_view)
            else {
                trace!(neighbor = %neighbor.id(), "no single crossing");
                continue;
            };

            let mut candidate = primary.clone();
            candidate.snap_point = point;
            candidate.intersect_curve = Some(neighbor_curve);
            candidate.intersect_id = Some(neighbor.id());
            if !candidate.measure_heat(&request.close_point, &request.world_to_view, scope.aperture, false) {
                continue;
            }
            trace!(neighbor = %neighbor.id(), heat = ?candidate.heat, "intersection");
            if ranker.update_if_better(candidate) {
                break;
            }
        }
        Ok(())
    }
}

/// Evaluate `mode` and carry the result into world coordinates.
fn mode_candidate(scope: &Scope<'_>, evaluator: &Evaluator<'_>, mode: SnapMode) -> Option<SnapCandidate> {
    let request = scope.request;
    let hit = evaluator.hit;
    let location = evaluator.evaluate(mode)?;
    let to_world = &hit.local_to_world;

    let mut candidate = SnapCandidate::new(mode, to_world.apply_point(&location.point));
    candidate.hit_point = Some(hit.hit_point_world(scope.aperture));
    candidate.normal = location
        .normal
        .and_then(|n| to_world.apply_normal(&n).try_normalize(f64::EPSILON));
    candidate.geom_type = location.geom_type;
    candidate.parent_type = hit.feature.parent_type;
    candidate.interior_was_pickable = request.view_flags.interior_pickable(&hit.params);
    candidate.curve = location.curve.map(|c| c.transformed(to_world));
    let measured = candidate.measure_heat(
        &request.close_point,
        &request.world_to_view,
        scope.aperture,
        mode == SnapMode::Center,
    );
    if !measured {
        // The intersection pass measures its own points.
        if mode != SnapMode::Intersection {
            return None;
        }
        candidate.view_distance = f64::INFINITY;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ElementId, ObjectStore};
    use crate::GeometricPrimitive;
    use vcad_snap_geom::CurvePrimitive;
    use vcad_snap_math::ViewMap;

    fn store_with_line() -> Arc<ObjectStore> {
        let store = ObjectStore::new();
        store.insert(GeometricObject {
            id: ElementId(1),
            placement: Transform::identity(),
            placement_origin: Some(Point3::new(-3.0, 0.0, 0.0)),
            stream: GeometryStream::from_primitives([GeometricPrimitive::Curve(CurvePrimitive::line(
                Point3::origin(),
                Point3::new(10.0, 0.0, 0.0),
            ))]),
        });
        Arc::new(store)
    }

    #[test]
    fn test_bad_aperture_and_divisor() {
        let engine = SnapEngine::new(store_with_line());
        let mut request = SnapRequest::new(
            SnapTarget::Object(ElementId(1)),
            [SnapMode::MidPoint],
            Point3::new(4.0, 0.0, 0.0),
            ViewMap::identity(),
        );
        request.snap_divisor = Some(0);
        assert_eq!(engine.snap(&request, &CancelToken::new()).status, SnapStatus::BadArg);
        request.snap_divisor = None;
        request.snap_aperture = Some(0.0);
        assert_eq!(engine.snap(&request, &CancelToken::new()).status, SnapStatus::BadArg);
    }

    #[test]
    fn test_origin_mode_uses_placement_origin() {
        let engine = SnapEngine::new(store_with_line());
        let request = SnapRequest::new(
            SnapTarget::Object(ElementId(1)),
            [SnapMode::Origin],
            Point3::new(-2.0, 0.0, 0.0),
            ViewMap::identity(),
        );
        let response = engine.snap(&request, &CancelToken::new());
        assert!(response.is_success());
        assert_eq!(response.snap_mode, Some(SnapMode::Origin));
        assert_eq!(response.snap_point, Some(Point3::new(-3.0, 0.0, 0.0)));
        assert_eq!(response.geom_type, Some(HitGeomType::Point));
    }

    #[test]
    fn test_intersection_without_neighbors_is_dropped() {
        let engine = SnapEngine::new(store_with_line());
        let request = SnapRequest::new(
            SnapTarget::Object(ElementId(1)),
            [SnapMode::Intersection],
            Point3::new(4.0, 0.0, 0.0),
            ViewMap::identity(),
        );
        assert_eq!(
            engine.snap(&request, &CancelToken::new()).status,
            SnapStatus::NoSnapPossible
        );
    }

    #[test]
    fn test_unmeasured_intersection_candidate_is_kept() {
        use crate::geometry::{GeometryParams, HitParentGeomType};
        use crate::kernel::NullKernel;
        use crate::request::SnapHeat;
        use crate::stream::EntryId;
        use crate::tracker::CurveFeature;

        // Points at z = 10 have zero weight in this view.
        let mut forward = Transform::identity().matrix;
        forward[(3, 2)] = -0.1;
        let view = ViewMap::new(forward).unwrap();

        let curve = CurvePrimitive::line(Point3::new(0.0, 0.0, 10.0), Point3::new(10.0, 0.0, 10.0));
        let pick = Point3::new(4.0, 0.5, 10.0);
        let location = curve.closest_point_bounded(&pick).unwrap();
        let hit = TrackedHit {
            feature: CurveFeature {
                curve: Some(curve.clone()),
                curve_id: None,
                location,
                geom_type: HitGeomType::None,
                parent_type: HitParentGeomType::Wire,
                close_point_local: pick,
                distance_local: location.distance,
                check_interior: false,
            },
            geometry: Arc::new(GeometricPrimitive::Curve(curve)),
            brep: None,
            params: GeometryParams::default(),
            entry_id: EntryId::element(0),
            local_to_world: Transform::identity(),
            local_view: ViewMap::identity(),
            distance_view: location.distance,
        };
        let settings = SnapSettings::default();
        let evaluator = Evaluator {
            hit: &hit,
            kernel: &NullKernel,
            settings: &settings,
            divisor: 2,
            aperture: 12.0,
            find_arc_centers: true,
        };
        let request = SnapRequest::new(
            SnapTarget::Object(ElementId(1)),
            [SnapMode::Nearest, SnapMode::Intersection],
            pick,
            view,
        );
        let scope = Scope {
            request: &request,
            aperture: 12.0,
        };

        assert!(mode_candidate(&scope, &evaluator, SnapMode::Nearest).is_none());
        let candidate = mode_candidate(&scope, &evaluator, SnapMode::Intersection).unwrap();
        assert_eq!(candidate.heat, SnapHeat::None);
        assert!(candidate.view_distance.is_infinite());
        assert!(candidate.curve.is_some());
    }

    #[test]
    fn test_primary_filter_rules() {
        let engine = SnapEngine::new(store_with_line());
        let mut request = SnapRequest::new(
            SnapTarget::Object(ElementId(1)),
            [SnapMode::Nearest],
            Point3::origin(),
            ViewMap::identity(),
        );
        request.geometry_class = Some(crate::GeometryClass::Construction);
        let resolved = engine.resolve(&request.target).unwrap();
        let filter = engine.primary_filter(&request, &resolved);
        // A class without a sub-category is ignored.
        assert!(filter.geometry_class.is_none());
        assert!(filter.view_flags.is_some());

        request.sub_category = Some(crate::SubCategoryId(4));
        let filter = engine.primary_filter(&request, &resolved);
        assert_eq!(filter.geometry_class, Some(crate::GeometryClass::Construction));
        assert!(filter.view_flags.is_none());

        let inline = SnapTarget::Geometry {
            id: ElementId(9),
            stream: GeometryStream::default(),
        };
        let resolved = engine.resolve(&inline).unwrap();
        let filter = engine.primary_filter(&request, &resolved);
        assert!(filter.sub_category.is_none());
        assert!(filter.geometry_class.is_none());
    }
}
