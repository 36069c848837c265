//! vcad-snap - snap resolution for vcad drafting
//!
//! Given a coarse pick on an object and a set of snap modes, find the
//! precise point the cursor should lock to: the nearest point, a keypoint,
//! a midpoint, a center, an apparent intersection with a neighbor, or the
//! object's placement origin.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vcad_snap::{
//!     CancelToken, ElementId, GeometricObject, GeometricPrimitive, GeometryStream, ObjectStore,
//!     SnapEngine, SnapMode, SnapRequest, SnapTarget,
//! };
//! use vcad_snap_geom::CurvePrimitive;
//! use vcad_snap_math::{Point3, Transform, ViewMap};
//!
//! let store = ObjectStore::new();
//! store.insert(GeometricObject {
//!     id: ElementId(1),
//!     placement: Transform::identity(),
//!     placement_origin: None,
//!     stream: GeometryStream::from_primitives([GeometricPrimitive::Curve(CurvePrimitive::line(
//!         Point3::origin(),
//!         Point3::new(10.0, 0.0, 0.0),
//!     ))]),
//! });
//!
//! let engine = SnapEngine::new(Arc::new(store));
//! let request = SnapRequest::new(
//!     SnapTarget::Object(ElementId(1)),
//!     [SnapMode::MidPoint],
//!     Point3::new(4.0, 0.5, 0.0),
//!     ViewMap::identity(),
//! );
//! let response = engine.snap(&request, &CancelToken::new());
//! assert_eq!(response.snap_point, Some(Point3::new(5.0, 0.0, 0.0)));
//! ```

mod cache;
mod cancel;
mod engine;
mod error;
mod evaluate;
mod filter;
mod geometry;
mod intersect;
mod kernel;
mod rank;
mod request;
mod settings;
mod stream;
mod tracker;

pub use cache::{CacheStats, ElementGeometryCache, GeometryCacheRegistry};
pub use cancel::{CancelToken, Cancelled};
pub use engine::SnapEngine;
pub use error::{Result, SnapError};
pub use filter::{outside_range, EntryFilter};
pub use geometry::{
    BRepData, CurveId, FillDisplay, GeometricPrimitive, GeometryClass, GeometryParams,
    HitGeomType, HitParentGeomType, SubCategoryId,
};
pub use intersect::closest_intersection;
pub use kernel::{BRepEntity, BRepSnapFeatures, KernelCurve, NullKernel, SolidKernel};
pub use rank::{SnapCandidate, SnapRanker};
pub use request::{
    RenderMode, SnapHeat, SnapMode, SnapRequest, SnapResponse, SnapStatus, SnapTarget, ViewFlags,
};
pub use settings::SnapSettings;
pub use stream::{
    ElementId, EntryGeometry, EntryId, GeometricObject, GeometryPart, GeometryProvider,
    GeometryStream, ObjectStore, Scene, StreamEntry,
};
