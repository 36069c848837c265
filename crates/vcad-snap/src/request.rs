//! Snap request and response wire types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vcad_snap_geom::CurvePrimitive;
use vcad_snap_math::{Point3, Vec3, ViewMap};

use crate::error::Result;
use crate::geometry::{
    FillDisplay, GeometryClass, GeometryParams, HitGeomType, HitParentGeomType, SubCategoryId,
};
use crate::stream::{ElementId, EntryId, GeometryStream};

/// Snap strategies, in priority order: when two candidates are equally
/// close the earlier mode wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapMode {
    /// Closest point on the feature.
    Nearest,
    /// Closest of the equally spaced keypoints.
    NearestKeypoint,
    /// Middle of the segment or arc.
    MidPoint,
    /// Arc center or centroid.
    Center,
    /// Curve start or placement origin.
    Origin,
    /// Point at half the curve length.
    Bisector,
    /// Apparent crossing with a neighboring object.
    Intersection,
}

/// Quality of a snap relative to the aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapHeat {
    /// Outside the aperture.
    #[default]
    None,
    /// Outside the aperture but shown anyway.
    NotInRange,
    /// Inside the aperture ("hot").
    InRange,
}

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapStatus {
    /// A snap point was found.
    Success,
    /// Nothing to snap to.
    NoSnapPossible,
    /// The geometry is view independent.
    NotSnappable,
    /// The request was cancelled.
    Aborted,
    /// The request was malformed or named nothing.
    BadArg,
}

/// How the view draws geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Edges only.
    Wireframe,
    /// Edges with hidden lines removed.
    HiddenLine,
    /// Filled faces.
    #[default]
    SolidFill,
    /// Shaded faces.
    SmoothShade,
}

fn yes() -> bool {
    true
}

/// Display switches of the view the pick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFlags {
    /// Render mode.
    #[serde(default)]
    pub render_mode: RenderMode,
    /// Show construction geometry.
    #[serde(default = "yes")]
    pub constructions: bool,
    /// Show dimensions.
    #[serde(default = "yes")]
    pub dimensions: bool,
    /// Show patterns.
    #[serde(default = "yes")]
    pub patterns: bool,
    /// Show fill of `ByView` regions.
    #[serde(default = "yes")]
    pub show_fill: bool,
}

impl Default for ViewFlags {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::default(),
            constructions: true,
            dimensions: true,
            patterns: true,
            show_fill: true,
        }
    }
}

impl ViewFlags {
    /// Whether entries of `class` are displayed.
    pub fn shows(&self, class: GeometryClass) -> bool {
        match class {
            GeometryClass::Primary => true,
            GeometryClass::Construction => self.constructions,
            GeometryClass::Dimension => self.dimensions,
            GeometryClass::Pattern => self.patterns,
        }
    }

    /// Whether the interior of geometry drawn with `params` could have
    /// been picked.
    pub fn interior_pickable(&self, params: &GeometryParams) -> bool {
        self.render_mode != RenderMode::Wireframe
            || (params.fill_display == FillDisplay::ByView && self.show_fill)
            || params.fill_display > FillDisplay::ByView
    }
}

/// What a request snaps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapTarget {
    /// A stored object.
    Object(ElementId),
    /// Geometry that is not stored, such as a pickable decoration.
    Geometry {
        /// Id reported back for intersections.
        id: ElementId,
        /// The geometry.
        stream: GeometryStream,
    },
}

impl SnapTarget {
    /// The id the target is known by.
    pub fn id(&self) -> ElementId {
        match self {
            Self::Object(id) => *id,
            Self::Geometry { id, .. } => *id,
        }
    }
}

/// One snap request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapRequest {
    /// What to snap to.
    pub target: SnapTarget,
    /// Requested modes.
    pub snap_modes: BTreeSet<SnapMode>,
    /// The cursor position, world coordinates.
    pub test_point: Point3,
    /// Coarse surface point from the pick, world coordinates.
    pub close_point: Point3,
    /// World to view map.
    pub world_to_view: ViewMap,
    /// Hot radius in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_aperture: Option<f64>,
    /// Keypoint divisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_divisor: Option<u32>,
    /// Only entries on this sub-category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<SubCategoryId>,
    /// Only entries of this class; honored with a sub-category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_class: Option<GeometryClass>,
    /// The entry that produced the pick, for a precise second pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    /// Display switches.
    #[serde(default)]
    pub view_flags: ViewFlags,
    /// Neighbors to intersect with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intersect_candidates: Vec<SnapTarget>,
}

impl SnapRequest {
    /// Request with defaults for everything but the essentials.
    pub fn new(
        target: SnapTarget,
        snap_modes: impl IntoIterator<Item = SnapMode>,
        close_point: Point3,
        world_to_view: ViewMap,
    ) -> Self {
        Self {
            target,
            snap_modes: snap_modes.into_iter().collect(),
            test_point: close_point,
            close_point,
            world_to_view,
            snap_aperture: None,
            snap_divisor: None,
            sub_category: None,
            geometry_class: None,
            entry_id: None,
            view_flags: ViewFlags::default(),
            intersect_candidates: Vec::new(),
        }
    }

    /// Parse a request from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Result of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapResponse {
    /// Outcome.
    pub status: SnapStatus,
    /// Mode of the winning snap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_mode: Option<SnapMode>,
    /// Snap point, world coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_point: Option<Point3>,
    /// Point on the geometry under the cursor, used when the snap is not hot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_point: Option<Point3>,
    /// Quality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat: Option<SnapHeat>,
    /// Feature kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom_type: Option<HitGeomType>,
    /// Containing shape kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_geom_type: Option<HitParentGeomType>,
    /// Unit surface or plane normal, world coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<Vec3>,
    /// Curve to highlight, world coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurvePrimitive>,
    /// Neighbor curve of an intersection, world coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersect_curve: Option<CurvePrimitive>,
    /// Neighbor of an intersection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersect_id: Option<ElementId>,
}

impl SnapResponse {
    /// Response carrying only a status.
    pub fn status(status: SnapStatus) -> Self {
        Self {
            status,
            snap_mode: None,
            snap_point: None,
            hit_point: None,
            heat: None,
            geom_type: None,
            parent_geom_type: None,
            normal: None,
            curve: None,
            intersect_curve: None,
            intersect_id: None,
        }
    }

    /// Whether a snap point was produced.
    pub fn is_success(&self) -> bool {
        self.status == SnapStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_priority_order() {
        let modes: BTreeSet<SnapMode> =
            [SnapMode::Intersection, SnapMode::Center, SnapMode::Nearest, SnapMode::MidPoint]
                .into_iter()
                .collect();
        let ordered: Vec<SnapMode> = modes.into_iter().collect();
        assert_eq!(
            ordered,
            vec![SnapMode::Nearest, SnapMode::MidPoint, SnapMode::Center, SnapMode::Intersection]
        );
    }

    #[test]
    fn test_request_json_defaults() {
        let json = serde_json::json!({
            "target": {"object": 12},
            "snapModes": ["midPoint", "nearest"],
            "testPoint": [1.0, 0.0, 0.0],
            "closePoint": [1.0, 0.0, 0.0],
            "worldToView": {
                "forward": [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
                "inverse": [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
            }
        });
        let request: SnapRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.target, SnapTarget::Object(ElementId(12)));
        assert_eq!(request.snap_modes.len(), 2);
        assert!(request.snap_aperture.is_none());
        assert!(request.view_flags.patterns);
        assert!(request.intersect_candidates.is_empty());
    }

    #[test]
    fn test_interior_pickable() {
        let wire = ViewFlags {
            render_mode: RenderMode::Wireframe,
            show_fill: false,
            ..ViewFlags::default()
        };
        let mut params = GeometryParams::default();
        assert!(!wire.interior_pickable(&params));
        params.fill_display = FillDisplay::ByView;
        assert!(!wire.interior_pickable(&params));
        params.fill_display = FillDisplay::Always;
        assert!(wire.interior_pickable(&params));
        assert!(ViewFlags::default().interior_pickable(&GeometryParams::default()));
    }

    #[test]
    fn test_status_only_response_json() {
        let json = serde_json::to_value(SnapResponse::status(SnapStatus::Aborted)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "aborted"}));
    }
}
