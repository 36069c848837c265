//! Text, raster images and point strings.

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Point3, Range3, Transform, Vec3};

use crate::collection::CurveCollection;
use crate::curve::{CurveLocation, CurvePrimitive};

fn default_x() -> Vec3 {
    Vec3::x()
}

fn default_y() -> Vec3 {
    Vec3::y()
}

/// A single run of text placed in a plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextString {
    /// The characters.
    pub text: String,
    /// Lower-left corner of the text box at the baseline.
    pub origin: Point3,
    /// Baseline direction (unit).
    #[serde(default = "default_x")]
    pub x_dir: Vec3,
    /// Up direction (unit).
    #[serde(default = "default_y")]
    pub y_dir: Vec3,
    /// Advance width of the whole run.
    pub width: f64,
    /// Cap height.
    pub height: f64,
    /// Depth below the baseline.
    #[serde(default)]
    pub descent: f64,
}

impl TextString {
    /// Closed outline of the text box, or `None` for empty text.
    pub fn bounding_shape(&self) -> Option<CurveCollection> {
        if self.text.is_empty() {
            return None;
        }
        let at = |u: f64, v: f64| self.origin + self.x_dir * u + self.y_dir * v;
        let (lo, hi) = (-self.descent, self.height);
        Some(CurveCollection::outer(vec![CurvePrimitive::line_string(vec![
            at(0.0, lo),
            at(self.width, lo),
            at(self.width, hi),
            at(0.0, hi),
            at(0.0, lo),
        ])]))
    }

    /// Copy mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            origin: t.apply_point(&self.origin),
            x_dir: t.apply_vec(&self.x_dir),
            y_dir: t.apply_vec(&self.y_dir),
            ..self.clone()
        }
    }

    /// Range of the bounding shape.
    pub fn range(&self) -> Range3 {
        self.bounding_shape()
            .map_or_else(Range3::null, |shape| shape.range())
    }
}

/// A raster image drawn on a quadrilateral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGraphic {
    /// Corners in drawing order.
    pub corners: [Point3; 4],
}

impl ImageGraphic {
    /// Closed outline through the corners.
    pub fn outline(&self) -> CurveCollection {
        let mut points = self.corners.to_vec();
        points.push(self.corners[0]);
        CurveCollection::outer(vec![CurvePrimitive::line_string(points)])
    }

    /// Copy mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            corners: self.corners.map(|p| t.apply_point(&p)),
        }
    }

    /// Range of the corners.
    pub fn range(&self) -> Range3 {
        Range3::from_points(self.corners.iter())
    }
}

/// Disconnected points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointString {
    /// The points.
    pub points: Vec<Point3>,
}

impl PointString {
    /// Nearest of the points.
    pub fn closest_point(&self, p: &Point3) -> Option<CurveLocation> {
        let n = self.points.len();
        let (index, q) = self
            .points
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - p).norm_squared().total_cmp(&(b.1 - p).norm_squared()))?;
        let fraction = if n > 1 { index as f64 / (n - 1) as f64 } else { 0.0 };
        Some(CurveLocation {
            component_index: index,
            ..CurveLocation::new(fraction, *q).measured_from(p)
        })
    }

    /// Copy mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            points: self.points.iter().map(|p| t.apply_point(p)).collect(),
        }
    }

    /// Range of the points.
    pub fn range(&self) -> Range3 {
        Range3::from_points(self.points.iter())
    }
}
