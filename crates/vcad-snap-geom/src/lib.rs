#![warn(missing_docs)]

//! Geometry for the vcad snap engine.
//!
//! Everything a snap can land on, with the queries snapping needs:
//!
//! - **Curves**: lines, line strings, elliptic arcs and B-spline curves,
//!   with bounded closest point, length, centroid and stroking
//! - **Curve collections**: open paths, loops and parity/union regions,
//!   with planarity, region containment and area centroids
//! - **Solids**: cones, spheres, tori, extrusions, rotational and ruled
//!   sweeps, decomposed into faces and wireframe curves
//! - **Surfaces and meshes**: B-spline surfaces and indexed polyfaces
//! - **Annotations**: text boxes, images and point strings
//! - **Intersection**: apparent curve/curve crossings in a view

mod annotation;
mod arc;
mod bspline;
mod collection;
mod curve;
mod intersect;
mod mesh;
mod plane;
mod solid;

pub use annotation::{ImageGraphic, PointString, TextString};
pub use arc::Ellipse3;
pub use bspline::{BSplineCurve, BSplineSurface, SurfaceLocation};
pub use collection::{BoundaryType, CurveCollection, CurveMember, RegionPierce};
pub use curve::{CurveLocation, CurvePrimitive, LineString, Segment3};
pub use intersect::{intersect_xy, CurveIntersection};
pub use mesh::{Facet, FacetLocation, Facets, Polyface};
pub use plane::{newell_normal, Plane, Ray3};
pub use solid::{
    ConeDetail, ExtrusionDetail, FaceGeometry, RotationalSweepDetail, RuledSweepDetail,
    SolidLocation, SolidPrimitive, SphereDetail, TorusPipeDetail, WireGeometry, WireframeMember,
};
