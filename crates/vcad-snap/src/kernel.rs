//! Capability interface for BRep evaluation.
//!
//! The engine never looks inside a BRep. A [`SolidKernel`] decodes the
//! opaque payload once (the result is cached per object) and answers the
//! closest-curve and interior-point queries snapping needs.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use vcad_snap_geom::CurvePrimitive;
use vcad_snap_math::{Point3, Range3, Vec3};

use crate::error::{Result, SnapError};
use crate::geometry::{BRepData, CurveId, HitGeomType, HitParentGeomType};

/// A decoded BRep owned by a kernel.
pub trait BRepEntity: Send + Sync + fmt::Debug {
    /// Local range of the body.
    fn range(&self) -> Range3;

    /// Downcast hook for the kernel that produced the entity.
    fn as_any(&self) -> &dyn Any;
}

/// A curve offered by the kernel as a snap candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelCurve {
    /// Edge or iso-curve geometry in body coordinates.
    pub curve: CurvePrimitive,
    /// Topological id of the edge or face the curve came from.
    pub curve_id: Option<CurveId>,
    /// `None` for edges, `Surface` for face iso-curves.
    pub geom_type: HitGeomType,
}

/// Curves near a pick on a body.
#[derive(Debug, Clone, PartialEq)]
pub struct BRepSnapFeatures {
    /// Candidate curves.
    pub curves: Vec<KernelCurve>,
    /// Closest point on the body's faces, when one was found.
    pub surface_point: Option<Point3>,
    /// `Solid` for closed bodies, `Sheet` for open ones, `Wire` for wire bodies.
    pub parent: HitParentGeomType,
}

/// BRep services consumed by the engine.
pub trait SolidKernel: Send + Sync {
    /// Decode a payload into an entity.
    fn decode(&self, data: &BRepData) -> Result<Arc<dyn BRepEntity>>;

    /// Edges and face curves of `entity` near `local_point`, with iso-curves
    /// placed at multiples of `1 / divisor`.
    fn snap_features(
        &self,
        entity: &dyn BRepEntity,
        local_point: &Point3,
        divisor: u32,
    ) -> Option<BRepSnapFeatures>;

    /// Point and unit normal on the face seen along `view_z` (pointing at
    /// the eye) nearest `test_point`. `local_point` is the point to project
    /// when snapping to the interior.
    fn evaluate_interior(
        &self,
        entity: &dyn BRepEntity,
        local_point: &Point3,
        test_point: &Point3,
        view_z: &Vec3,
    ) -> Option<(Point3, Vec3)>;
}

/// Kernel used when none is configured: every BRep is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullKernel;

impl SolidKernel for NullKernel {
    fn decode(&self, data: &BRepData) -> Result<Arc<dyn BRepEntity>> {
        Err(SnapError::Payload(format!(
            "no solid kernel for brep format '{}'",
            data.format
        )))
    }

    fn snap_features(&self, _: &dyn BRepEntity, _: &Point3, _: u32) -> Option<BRepSnapFeatures> {
        None
    }

    fn evaluate_interior(
        &self,
        _: &dyn BRepEntity,
        _: &Point3,
        _: &Point3,
        _: &Vec3,
    ) -> Option<(Point3, Vec3)> {
        None
    }
}
