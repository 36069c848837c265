//! Geometry variants and the classification tags attached to snap hits.

use serde::{Deserialize, Serialize};
use vcad_snap_geom::{
    BSplineSurface, CurveCollection, CurvePrimitive, ImageGraphic, PointString, Polyface,
    SolidPrimitive, TextString,
};
use vcad_snap_math::Range3;

/// One geometric primitive of a geometry stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GeometricPrimitive {
    /// Single open curve.
    Curve(CurvePrimitive),
    /// Path, loop or region.
    CurveCollection(CurveCollection),
    /// Analytic solid or sheet.
    Solid(SolidPrimitive),
    /// B-spline surface.
    Surface(BSplineSurface),
    /// Indexed polyface.
    Mesh(Polyface),
    /// Opaque boundary representation, evaluated by a [`SolidKernel`](crate::SolidKernel).
    BRep(BRepData),
    /// Text run.
    Text(TextString),
    /// Raster image.
    Image(ImageGraphic),
    /// Disconnected points.
    PointString(PointString),
}

impl GeometricPrimitive {
    /// Local range. BReps report a null range; their decoded entity knows
    /// its own extent.
    pub fn range(&self) -> Range3 {
        match self {
            Self::Curve(c) => c.range(),
            Self::CurveCollection(c) => c.range(),
            Self::Solid(s) => s.range(),
            Self::Surface(s) => s.range(),
            Self::Mesh(m) => m.range(),
            Self::BRep(_) => Range3::null(),
            Self::Text(t) => t.range(),
            Self::Image(i) => i.range(),
            Self::PointString(p) => p.range(),
        }
    }

    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Curve(_) => "curve",
            Self::CurveCollection(_) => "curve collection",
            Self::Solid(_) => "solid",
            Self::Surface(_) => "surface",
            Self::Mesh(_) => "mesh",
            Self::BRep(_) => "brep",
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::PointString(_) => "point string",
        }
    }
}

/// What kind of feature a snap landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitGeomType {
    /// An edge or wire.
    #[default]
    None,
    /// An isolated point or a detected center.
    Point,
    /// The interior of a face.
    Surface,
}

/// The shape that contains the snapped feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitParentGeomType {
    /// Unclassified.
    #[default]
    None,
    /// Open wire geometry.
    Wire,
    /// Planar region or open sheet.
    Sheet,
    /// Closed solid.
    Solid,
    /// Polyface mesh.
    Mesh,
    /// Text.
    Text,
}

/// Display class of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryClass {
    /// Regular geometry.
    #[default]
    Primary,
    /// Construction aids.
    Construction,
    /// Dimension graphics.
    Dimension,
    /// Hatch and area patterns.
    Pattern,
}

/// How region interiors are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillDisplay {
    /// Never filled.
    #[default]
    Never,
    /// Filled when the view shows fill.
    ByView,
    /// Always filled.
    Always,
    /// Filled with the background color.
    Blanking,
}

/// Sub-category identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubCategoryId(pub u64);

/// Display attributes of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryParams {
    /// Sub-category the entry draws on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<SubCategoryId>,
    /// Display class.
    #[serde(default)]
    pub geometry_class: GeometryClass,
    /// Fill mode for regions.
    #[serde(default)]
    pub fill_display: FillDisplay,
}

/// Topological identity of a curve produced by a solid kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurveId(pub u64);

/// Encoded BRep bytes, carried as base64 in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BRepData {
    /// Format tag understood by the kernel.
    #[serde(default)]
    pub format: String,
    /// Raw payload.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}
