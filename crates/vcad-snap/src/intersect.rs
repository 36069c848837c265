//! Apparent intersections between the snapped curve and a neighbor.

use vcad_snap_geom::{intersect_xy, CurvePrimitive};
use vcad_snap_math::{real_distance_xy, Point3, ViewMap};

/// The crossing of `curve` and `neighbor` (both in world coordinates) that
/// appears closest to `close_point` in the view.
///
/// `None` when the curves do not cross or the closest crossing is an
/// overlapping span rather than a single point.
pub fn closest_intersection(
    curve: &CurvePrimitive,
    neighbor: &CurvePrimitive,
    close_point: &Point3,
    view: &ViewMap,
) -> Option<Point3> {
    let close_view = view.project(close_point);
    let closest = intersect_xy(curve, neighbor, view)
        .into_iter()
        .filter_map(|crossing| {
            let distance = real_distance_xy(&view.project(&crossing.point_a), &close_view)?;
            Some((crossing, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))?
        .0;
    (!closest.overlap).then_some(closest.point_a)
}
