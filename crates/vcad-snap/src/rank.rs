//! Snap candidates and the rules for choosing between them.

use vcad_snap_geom::CurvePrimitive;
use vcad_snap_math::{real_distance_xy, Point3, Vec3, ViewMap};

use crate::geometry::{HitGeomType, HitParentGeomType};
use crate::request::{SnapHeat, SnapMode, SnapResponse, SnapStatus};
use crate::settings::SnapSettings;
use crate::stream::ElementId;

/// One evaluated snap, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapCandidate {
    pub mode: SnapMode,
    pub snap_point: Point3,
    /// Point under the cursor; used by the caller when the snap is not hot.
    pub hit_point: Option<Point3>,
    pub normal: Option<Vec3>,
    pub heat: SnapHeat,
    /// View XY distance from the snap point to the pick.
    pub view_distance: f64,
    pub geom_type: HitGeomType,
    pub parent_type: HitParentGeomType,
    /// The view could have picked the interior of the hit geometry.
    pub interior_was_pickable: bool,
    pub curve: Option<CurvePrimitive>,
    pub intersect_curve: Option<CurvePrimitive>,
    pub intersect_id: Option<ElementId>,
}

impl SnapCandidate {
    /// Candidate at `snap_point` with nothing else known.
    pub fn new(mode: SnapMode, snap_point: Point3) -> Self {
        Self {
            mode,
            snap_point,
            hit_point: None,
            normal: None,
            heat: SnapHeat::None,
            view_distance: 0.0,
            geom_type: HitGeomType::None,
            parent_type: HitParentGeomType::None,
            interior_was_pickable: false,
            curve: None,
            intersect_curve: None,
            intersect_id: None,
        }
    }

    /// Hot and not a plain nearest snap.
    pub fn is_in_range(&self) -> bool {
        self.heat == SnapHeat::InRange && self.mode != SnapMode::Nearest
    }

    /// Rate the snap point against the pick. Outside the aperture a forced
    /// candidate is `NotInRange`, anything else `None`. False when the
    /// distance cannot be computed.
    pub fn measure_heat(
        &mut self,
        close_point: &Point3,
        view: &ViewMap,
        aperture: f64,
        force_hot: bool,
    ) -> bool {
        let Some(distance) =
            real_distance_xy(&view.project(&self.snap_point), &view.project(close_point))
        else {
            return false;
        };
        self.view_distance = distance;
        self.heat = if distance <= aperture {
            SnapHeat::InRange
        } else if force_hot {
            SnapHeat::NotInRange
        } else {
            SnapHeat::None
        };
        true
    }
}

/// Folds candidates into the best one.
#[derive(Debug)]
pub struct SnapRanker<'a> {
    view: &'a ViewMap,
    test_point: Point3,
    aperture: f64,
    settings: &'a SnapSettings,
    best: Option<SnapCandidate>,
}

impl<'a> SnapRanker<'a> {
    pub fn new(view: &'a ViewMap, test_point: Point3, aperture: f64, settings: &'a SnapSettings) -> Self {
        Self {
            view,
            test_point,
            aperture,
            settings,
            best: None,
        }
    }

    /// The current winner.
    pub fn best(&self) -> Option<&SnapCandidate> {
        self.best.as_ref()
    }

    /// Whether the current winner is hot.
    pub fn best_in_range(&self) -> bool {
        self.best.as_ref().is_some_and(SnapCandidate::is_in_range)
    }

    /// Strictly farther candidates lose; ties keep the current one so the
    /// earlier mode wins.
    fn is_closer(&self, current: &SnapCandidate, other: &SnapCandidate) -> bool {
        if (current.view_distance - other.view_distance).abs() <= self.settings.tie_tolerance {
            return false;
        }
        current.view_distance >= other.view_distance
    }

    /// A wire center snap is preferred over a cold edge snap when the cursor
    /// is clearly nearer the center than the edge is.
    fn is_preferred(&self, snap: &SnapCandidate) -> bool {
        if snap.mode != SnapMode::Center {
            return false;
        }
        if snap.parent_type != HitParentGeomType::Wire && snap.interior_was_pickable {
            return false;
        }
        let snap_view = self.view.project(&snap.snap_point);
        let hit_point = snap.hit_point.unwrap_or(snap.snap_point);
        let (Some(edge), Some(test)) = (
            real_distance_xy(&snap_view, &self.view.project(&hit_point)),
            real_distance_xy(&snap_view, &self.view.project(&self.test_point)),
        ) else {
            return false;
        };
        edge > test && (edge - test).abs() > self.aperture * self.settings.preferred_center_margin
    }

    /// Whether `candidate` should replace the current winner.
    pub fn is_better(&self, candidate: &SnapCandidate) -> bool {
        let Some(current) = &self.best else {
            return true;
        };
        match (current.is_in_range(), candidate.is_in_range()) {
            (true, true) => self.is_closer(current, candidate),
            (true, false) => false,
            (false, true) => true,
            (false, false) => {
                if self.is_preferred(current) {
                    false
                } else if self.is_preferred(candidate) {
                    true
                } else {
                    self.is_closer(current, candidate)
                }
            }
        }
    }

    /// Replace the winner when `candidate` is better. True when the new
    /// winner is hot and the search can stop.
    pub fn update_if_better(&mut self, candidate: SnapCandidate) -> bool {
        if !self.is_better(&candidate) {
            return false;
        }
        let stop = candidate.is_in_range();
        self.best = Some(candidate);
        stop
    }

    /// Response describing the winner.
    pub fn into_response(self) -> SnapResponse {
        let Some(best) = self.best else {
            return SnapResponse::status(SnapStatus::NoSnapPossible);
        };
        let (intersect_curve, intersect_id) =
            match (best.curve.is_some(), best.intersect_curve, best.intersect_id) {
                (true, Some(curve), Some(id)) => (Some(curve), Some(id)),
                _ => (None, None),
            };
        SnapResponse {
            status: SnapStatus::Success,
            snap_mode: Some(best.mode),
            snap_point: Some(best.snap_point),
            hit_point: best.hit_point,
            heat: Some(best.heat),
            geom_type: Some(best.geom_type),
            parent_geom_type: Some(best.parent_type),
            normal: best.normal.filter(|n| n.norm() > 0.0),
            curve: best.curve,
            intersect_curve,
            intersect_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(mode: SnapMode, x: f64, close: &Point3, view: &ViewMap) -> SnapCandidate {
        let mut c = SnapCandidate::new(mode, Point3::new(x, 0.0, 0.0));
        c.hit_point = Some(*close);
        assert!(c.measure_heat(close, view, 12.0, mode == SnapMode::Center));
        c
    }

    #[test]
    fn test_heat() {
        let view = ViewMap::identity();
        let close = Point3::origin();
        assert_eq!(candidate(SnapMode::MidPoint, 5.0, &close, &view).heat, SnapHeat::InRange);
        assert_eq!(candidate(SnapMode::MidPoint, 20.0, &close, &view).heat, SnapHeat::None);
        assert_eq!(candidate(SnapMode::Center, 20.0, &close, &view).heat, SnapHeat::NotInRange);
        assert!(!candidate(SnapMode::Nearest, 1.0, &close, &view).is_in_range());
    }

    #[test]
    fn test_hot_beats_cold() {
        let view = ViewMap::identity();
        let settings = SnapSettings::default();
        let close = Point3::origin();
        let mut ranker = SnapRanker::new(&view, close, 12.0, &settings);
        assert!(!ranker.update_if_better(candidate(SnapMode::Nearest, 0.5, &close, &view)));
        assert!(ranker.update_if_better(candidate(SnapMode::MidPoint, 8.0, &close, &view)));
        assert_eq!(ranker.best().unwrap().mode, SnapMode::MidPoint);
        // A hot winner is only replaced by a closer hot candidate.
        assert!(!ranker.is_better(&candidate(SnapMode::Nearest, 0.0, &close, &view)));
        assert!(ranker.is_better(&candidate(SnapMode::Bisector, 3.0, &close, &view)));
    }

    #[test]
    fn test_ties_keep_earlier_mode() {
        let view = ViewMap::identity();
        let settings = SnapSettings::default();
        let close = Point3::origin();
        let mut ranker = SnapRanker::new(&view, close, 12.0, &settings);
        ranker.update_if_better(candidate(SnapMode::MidPoint, 4.0, &close, &view));
        assert!(!ranker.update_if_better(candidate(SnapMode::Bisector, 4.005, &close, &view)));
        assert_eq!(ranker.best().unwrap().mode, SnapMode::MidPoint);
    }

    #[test]
    fn test_preferred_wire_center() {
        let view = ViewMap::identity();
        let settings = SnapSettings::default();
        let close = Point3::new(30.0, 0.0, 0.0);
        let test = Point3::new(2.0, 0.0, 0.0);
        let mut ranker = SnapRanker::new(&view, test, 12.0, &settings);

        let edge = candidate(SnapMode::Nearest, 29.0, &close, &view);
        ranker.update_if_better(edge);

        let mut center = candidate(SnapMode::Center, 0.0, &close, &view);
        center.parent_type = HitParentGeomType::Wire;
        assert_eq!(center.heat, SnapHeat::NotInRange);
        // Farther from the pick than the edge snap, but the cursor sits near
        // the center.
        assert!(ranker.is_better(&center));
        ranker.update_if_better(center);
        assert_eq!(ranker.best().unwrap().mode, SnapMode::Center);
        assert!(!ranker.is_better(&candidate(SnapMode::Nearest, 29.5, &close, &view)));
    }

    #[test]
    fn test_pickable_interior_not_preferred() {
        let view = ViewMap::identity();
        let settings = SnapSettings::default();
        let ranker = SnapRanker::new(&view, Point3::new(2.0, 0.0, 0.0), 12.0, &settings);
        let close = Point3::new(30.0, 0.0, 0.0);
        let mut center = candidate(SnapMode::Center, 0.0, &close, &view);
        center.parent_type = HitParentGeomType::Sheet;
        center.interior_was_pickable = true;
        assert!(!ranker.is_preferred(&center));
        center.interior_was_pickable = false;
        assert!(ranker.is_preferred(&center));
    }

    #[test]
    fn test_response_fields() {
        let view = ViewMap::identity();
        let settings = SnapSettings::default();
        let close = Point3::origin();
        let empty = SnapRanker::new(&view, close, 12.0, &settings);
        assert_eq!(empty.into_response().status, SnapStatus::NoSnapPossible);

        let mut ranker = SnapRanker::new(&view, close, 12.0, &settings);
        let mut c = candidate(SnapMode::Intersection, 1.0, &close, &view);
        c.normal = Some(Vec3::zeros());
        c.intersect_id = Some(ElementId(3));
        c.intersect_curve = Some(CurvePrimitive::line(Point3::origin(), Point3::new(0.0, 1.0, 0.0)));
        ranker.update_if_better(c);
        let response = ranker.into_response();
        assert_eq!(response.status, SnapStatus::Success);
        assert!(response.normal.is_none());
        // No primary curve, so the intersection details are withheld.
        assert!(response.intersect_id.is_none());
        assert_eq!(response.hit_point, Some(close));
    }
}
