//! Curve primitives and closest-point locations.

use serde::{Deserialize, Serialize};
use vcad_snap_math::{points_almost_equal, Point3, Range3, Transform, Vec3};

use crate::arc::Ellipse3;
use crate::bspline::BSplineCurve;

/// Golden-section minimization of `f` over `[lo, hi]`.
pub(crate) fn minimize_on_interval(lo: f64, hi: f64, f: impl Fn(f64) -> f64) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..80 {
        if (b - a).abs() < 1e-14 {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d);
        }
    }
    let mid = 0.5 * (a + b);
    // The bracket ends can win when the minimum sits on the boundary.
    [lo, mid, hi]
        .into_iter()
        .min_by(|x, y| f(*x).total_cmp(&f(*y)))
        .unwrap_or(mid)
}

/// Where a point lies on a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveLocation {
    /// Fraction along the whole curve.
    pub fraction: f64,
    /// The point on the curve.
    pub point: Point3,
    /// Distance from the query point (zero when not measured).
    pub distance: f64,
    /// Segment index within a line string.
    pub component_index: usize,
    /// Fraction within the segment of a line string.
    pub component_fraction: f64,
}

impl CurveLocation {
    /// Location at `fraction` with no distance measured.
    pub fn new(fraction: f64, point: Point3) -> Self {
        Self {
            fraction,
            point,
            distance: 0.0,
            component_index: 0,
            component_fraction: fraction,
        }
    }

    /// Record the distance from `query`.
    pub fn measured_from(mut self, query: &Point3) -> Self {
        self.distance = (self.point - query).norm();
        self
    }
}

/// A straight segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment3 {
    /// Start point.
    pub start: Point3,
    /// End point.
    pub end: Point3,
}

impl Segment3 {
    /// Segment between two points.
    pub fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    /// Length of the segment.
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Point at a fraction along the segment.
    pub fn fraction_to_point(&self, fraction: f64) -> Point3 {
        self.start + (self.end - self.start) * fraction
    }

    /// Midpoint.
    pub fn midpoint(&self) -> Point3 {
        nalgebra::center(&self.start, &self.end)
    }

    /// Fraction of the foot of `p`, clamped to the segment.
    pub fn closest_fraction(&self, p: &Point3) -> f64 {
        let d = self.end - self.start;
        let dd = d.norm_squared();
        if dd < 1e-30 {
            return 0.0;
        }
        ((p - self.start).dot(&d) / dd).clamp(0.0, 1.0)
    }

    /// Closest point bounded to the segment.
    pub fn closest_point_bounded(&self, p: &Point3) -> CurveLocation {
        let f = self.closest_fraction(p);
        CurveLocation::new(f, self.fraction_to_point(f)).measured_from(p)
    }
}

/// A polyline through a sequence of points.
///
/// Fractions are by segment count: segment `i` of `n` covers
/// `[i/n, (i+1)/n]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    /// The vertices.
    pub points: Vec<Point3>,
}

impl LineString {
    /// Line string through `points`.
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Segment `index`, if present.
    pub fn segment(&self, index: usize) -> Option<Segment3> {
        Some(Segment3::new(
            *self.points.get(index)?,
            *self.points.get(index + 1)?,
        ))
    }

    fn split_fraction(&self, fraction: f64) -> (usize, f64) {
        let n = self.segment_count();
        if n == 0 {
            return (0, 0.0);
        }
        let scaled = fraction.clamp(0.0, 1.0) * n as f64;
        let index = (scaled.floor() as usize).min(n - 1);
        (index, scaled - index as f64)
    }

    /// Point at a global fraction.
    pub fn fraction_to_point(&self, fraction: f64) -> Option<Point3> {
        if self.points.len() == 1 {
            return self.points.first().copied();
        }
        let (i, t) = self.split_fraction(fraction);
        Some(self.segment(i)?.fraction_to_point(t))
    }

    fn cumulative_lengths(&self) -> Vec<f64> {
        let mut total = 0.0;
        let mut out = Vec::with_capacity(self.points.len());
        out.push(0.0);
        for w in self.points.windows(2) {
            total += (w[1] - w[0]).norm();
            out.push(total);
        }
        out
    }

    fn length_to_fraction(&self, fraction: f64) -> f64 {
        let (i, t) = self.split_fraction(fraction);
        let lengths = self.cumulative_lengths();
        match self.segment(i) {
            Some(seg) => lengths[i] + t * seg.length(),
            None => 0.0,
        }
    }

    fn fraction_at_distance(&self, distance: f64) -> f64 {
        let n = self.segment_count();
        let lengths = self.cumulative_lengths();
        let total = lengths.last().copied().unwrap_or(0.0);
        if n == 0 || total <= 0.0 || distance <= 0.0 {
            return 0.0;
        }
        if distance >= total {
            return 1.0;
        }
        let i = lengths.partition_point(|&l| l <= distance).saturating_sub(1).min(n - 1);
        let seg_len = lengths[i + 1] - lengths[i];
        let t = if seg_len > 0.0 { (distance - lengths[i]) / seg_len } else { 0.0 };
        (i as f64 + t) / n as f64
    }

    /// Closest point over all segments.
    pub fn closest_point_bounded(&self, p: &Point3) -> Option<CurveLocation> {
        let n = self.segment_count();
        if n == 0 {
            let q = *self.points.first()?;
            return Some(CurveLocation::new(0.0, q).measured_from(p));
        }
        let mut best: Option<CurveLocation> = None;
        for i in 0..n {
            let seg = self.segment(i)?;
            let local = seg.closest_point_bounded(p);
            if best.map_or(true, |b| local.distance < b.distance) {
                best = Some(CurveLocation {
                    fraction: (i as f64 + local.fraction) / n as f64,
                    component_index: i,
                    component_fraction: local.fraction,
                    ..local
                });
            }
        }
        best
    }
}

/// A bounded curve primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CurvePrimitive {
    /// Straight segment.
    Line(Segment3),
    /// Polyline.
    LineString(LineString),
    /// Elliptic or circular arc.
    Arc(Ellipse3),
    /// B-spline curve.
    BSpline(BSplineCurve),
}

impl CurvePrimitive {
    /// Segment primitive.
    pub fn line(start: Point3, end: Point3) -> Self {
        Self::Line(Segment3::new(start, end))
    }

    /// Line-string primitive.
    pub fn line_string(points: Vec<Point3>) -> Self {
        Self::LineString(LineString::new(points))
    }

    /// Point at a fraction along the curve.
    pub fn fraction_to_point(&self, fraction: f64) -> Option<Point3> {
        match self {
            Self::Line(seg) => Some(seg.fraction_to_point(fraction)),
            Self::LineString(ls) => ls.fraction_to_point(fraction),
            Self::Arc(arc) => Some(arc.fraction_to_point(fraction)),
            Self::BSpline(bs) => bs.fraction_to_point(fraction),
        }
    }

    /// Derivative with respect to fraction.
    pub fn fraction_to_tangent(&self, fraction: f64) -> Option<Vec3> {
        match self {
            Self::Line(seg) => Some(seg.end - seg.start),
            Self::LineString(ls) => {
                let (i, _) = ls.split_fraction(fraction);
                let seg = ls.segment(i)?;
                Some((seg.end - seg.start) * ls.segment_count() as f64)
            }
            Self::Arc(arc) => Some(arc.fraction_to_tangent(fraction)),
            Self::BSpline(bs) => bs.fraction_to_tangent(fraction),
        }
    }

    /// Start point.
    pub fn start_point(&self) -> Option<Point3> {
        self.fraction_to_point(0.0)
    }

    /// End point.
    pub fn end_point(&self) -> Option<Point3> {
        self.fraction_to_point(1.0)
    }

    /// Closest point bounded to the curve's domain.
    pub fn closest_point_bounded(&self, p: &Point3) -> Option<CurveLocation> {
        match self {
            Self::Line(seg) => Some(seg.closest_point_bounded(p)),
            Self::LineString(ls) => ls.closest_point_bounded(p),
            Self::Arc(arc) => Some(arc.closest_point_bounded(p)),
            Self::BSpline(bs) => bs.closest_point_bounded(p),
        }
    }

    /// Arc length.
    pub fn length(&self) -> Option<f64> {
        match self {
            Self::Line(seg) => Some(seg.length()),
            Self::LineString(ls) => ls.cumulative_lengths().last().copied(),
            Self::Arc(arc) => Some(arc.length()),
            Self::BSpline(bs) => bs.length(),
        }
    }

    /// Signed arc length between two fractions.
    pub fn length_between(&self, f0: f64, f1: f64) -> Option<f64> {
        match self {
            Self::Line(seg) => Some(seg.length() * (f1 - f0)),
            Self::LineString(ls) => Some(ls.length_to_fraction(f1) - ls.length_to_fraction(f0)),
            Self::Arc(arc) => Some(arc.length_between(f0, f1)),
            Self::BSpline(bs) => bs.length_between(f0, f1),
        }
    }

    /// Location at arc length `distance` from the start, clamped to the curve.
    pub fn point_at_distance(&self, distance: f64) -> Option<CurveLocation> {
        let fraction = match self {
            Self::Line(seg) => {
                let len = seg.length();
                if len > 0.0 {
                    (distance / len).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            Self::LineString(ls) => ls.fraction_at_distance(distance),
            Self::Arc(arc) => arc.fraction_at_distance(distance),
            Self::BSpline(bs) => bs.fraction_at_distance(distance)?,
        };
        Some(CurveLocation::new(fraction, self.fraction_to_point(fraction)?))
    }

    /// Length-weighted centroid and the length.
    pub fn wire_centroid(&self) -> Option<(Point3, f64)> {
        match self {
            Self::Line(seg) => Some((seg.midpoint(), seg.length())),
            Self::LineString(ls) => {
                let mut weighted = Vec3::zeros();
                let mut total = 0.0;
                for w in ls.points.windows(2) {
                    let len = (w[1] - w[0]).norm();
                    weighted += nalgebra::center(&w[0], &w[1]).coords * len;
                    total += len;
                }
                if total <= 0.0 {
                    return Some((*ls.points.first()?, 0.0));
                }
                Some((Point3::from(weighted / total), total))
            }
            Self::Arc(arc) => Some((arc.wire_centroid(), arc.length())),
            Self::BSpline(bs) => {
                let samples = bs.sample(512);
                let mut weighted = Vec3::zeros();
                let mut total = 0.0;
                for w in samples.windows(2) {
                    let len = (w[1].1 - w[0].1).norm();
                    weighted += nalgebra::center(&w[0].1, &w[1].1).coords * len;
                    total += len;
                }
                if total <= 0.0 {
                    return Some((samples.first()?.1, 0.0));
                }
                Some((Point3::from(weighted / total), total))
            }
        }
    }

    /// Closed in space: a line string of more than three points whose ends
    /// meet, a full ellipse, or a closed B-spline.
    pub fn is_physically_closed(&self) -> bool {
        match self {
            Self::Line(_) => false,
            Self::LineString(ls) => {
                ls.points.len() > 3
                    && match (ls.points.first(), ls.points.last()) {
                        (Some(a), Some(b)) => points_almost_equal(a, b),
                        _ => false,
                    }
            }
            Self::Arc(arc) => arc.is_full(),
            Self::BSpline(bs) => bs.closed,
        }
    }

    /// Points along the curve with their fractions; lines and line strings
    /// are exact, other curves are chorded with at least `min_chords`.
    pub fn stroke(&self, min_chords: usize) -> Vec<(f64, Point3)> {
        match self {
            Self::Line(seg) => vec![(0.0, seg.start), (1.0, seg.end)],
            Self::LineString(ls) => {
                let n = ls.segment_count().max(1) as f64;
                ls.points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (i as f64 / n, *p))
                    .collect()
            }
            Self::Arc(arc) => {
                let n = arc.stroke_count().max(min_chords);
                (0..=n)
                    .map(|i| {
                        let f = i as f64 / n as f64;
                        (f, arc.fraction_to_point(f))
                    })
                    .collect()
            }
            Self::BSpline(bs) => bs.sample((8 * bs.poles.len()).max(min_chords)),
        }
    }

    /// Copy with every point mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        match self {
            Self::Line(seg) => Self::line(t.apply_point(&seg.start), t.apply_point(&seg.end)),
            Self::LineString(ls) => {
                Self::line_string(ls.points.iter().map(|p| t.apply_point(p)).collect())
            }
            Self::Arc(arc) => Self::Arc(arc.transformed(t)),
            Self::BSpline(bs) => Self::BSpline(bs.transformed(t)),
        }
    }

    /// Bounding range.
    pub fn range(&self) -> Range3 {
        match self {
            Self::Line(seg) => Range3::new(seg.start, seg.end),
            Self::LineString(ls) => Range3::from_points(ls.points.iter()),
            Self::Arc(arc) => arc.range(),
            Self::BSpline(bs) => bs.range(),
        }
    }
}
