//! Analytic solid primitives: face decomposition, closest point and the
//! wireframe curves used for snapping.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Dir3, Point3, Range3, Transform, Vec3};

use crate::arc::Ellipse3;
use crate::collection::CurveCollection;
use crate::curve::{minimize_on_interval, CurvePrimitive, Segment3};

/// Sweeps within this of a whole turn are treated as full.
const FULL_SWEEP_TOL: f64 = 1e-10;

/// Fraction samples seeding the swept-surface closest point search.
const SWEEP_SAMPLES: usize = 64;

/// Radii below this produce no section curves.
const MIN_RADIUS: f64 = 1e-12;

fn is_full_sweep(sweep: f64) -> bool {
    sweep.abs() >= TAU - FULL_SWEEP_TOL
}

/// Angle within `[0, sweep]` (respecting the sign of `sweep`) nearest to
/// `theta` around the circle.
fn clamp_to_sweep(theta: f64, sweep: f64) -> f64 {
    let s = if sweep < 0.0 { -1.0 } else { 1.0 };
    let t = (s * theta).rem_euclid(TAU);
    if is_full_sweep(sweep) || t <= sweep.abs() {
        return s * t;
    }
    if t - sweep.abs() < TAU - t {
        sweep
    } else {
        0.0
    }
}

/// Circular cone or cylinder between two parallel circles.
///
/// `vector_x` and `vector_y` are unit vectors perpendicular to the axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConeDetail {
    /// Center of the base circle.
    pub center_a: Point3,
    /// Center of the top circle.
    pub center_b: Point3,
    /// Section x axis.
    pub vector_x: Vec3,
    /// Section y axis.
    pub vector_y: Vec3,
    /// Base radius.
    pub radius_a: f64,
    /// Top radius.
    pub radius_b: f64,
    /// Closed with end disks.
    #[serde(default)]
    pub capped: bool,
}

/// Sphere, optionally limited to a latitude band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SphereDetail {
    /// Center.
    pub center: Point3,
    /// Equator x axis (unit).
    pub vector_x: Vec3,
    /// Equator y axis (unit).
    pub vector_y: Vec3,
    /// Radius.
    pub radius: f64,
    /// Lowest latitude in radians.
    #[serde(default = "south_pole")]
    pub latitude_start: f64,
    /// Latitude extent in radians.
    #[serde(default = "pole_to_pole")]
    pub latitude_sweep: f64,
    /// Closed with disks at partial latitude limits.
    #[serde(default)]
    pub capped: bool,
}

fn south_pole() -> f64 {
    -FRAC_PI_2
}

fn pole_to_pole() -> f64 {
    PI
}

/// Torus or pipe elbow swept about the axis `vector_x × vector_y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorusPipeDetail {
    /// Center of the major circle.
    pub center: Point3,
    /// Major circle x axis (unit).
    pub vector_x: Vec3,
    /// Major circle y axis (unit).
    pub vector_y: Vec3,
    /// Radius of the major circle.
    pub major_radius: f64,
    /// Radius of the pipe.
    pub minor_radius: f64,
    /// Sweep about the axis in radians.
    pub sweep: f64,
    /// Closed with end disks when partial.
    #[serde(default)]
    pub capped: bool,
}

/// Linear sweep of a base curve collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrusionDetail {
    /// Profile.
    pub base: CurveCollection,
    /// Extrusion vector.
    pub vector: Vec3,
    /// Closed with base and top faces (region profiles only).
    #[serde(default)]
    pub capped: bool,
}

/// Rotational sweep of a base curve collection about an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationalSweepDetail {
    /// Profile.
    pub base: CurveCollection,
    /// Point on the rotation axis.
    pub axis_origin: Point3,
    /// Rotation axis direction.
    pub axis_direction: Vec3,
    /// Sweep angle in radians.
    pub sweep: f64,
    /// Closed with start and end faces when partial.
    #[serde(default)]
    pub capped: bool,
}

/// Ruled surface through a sequence of sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuledSweepDetail {
    /// Sections in order.
    pub sections: Vec<CurveCollection>,
    /// Closed with first and last sections (region sections only).
    #[serde(default)]
    pub capped: bool,
}

/// An analytic solid or sheet primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SolidPrimitive {
    /// Cone or cylinder.
    Cone(ConeDetail),
    /// Sphere.
    Sphere(SphereDetail),
    /// Torus or pipe elbow.
    TorusPipe(TorusPipeDetail),
    /// Linear sweep.
    Extrusion(ExtrusionDetail),
    /// Rotational sweep.
    RotationalSweep(RotationalSweepDetail),
    /// Ruled sweep.
    RuledSweep(RuledSweepDetail),
}

/// One face of a solid primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceGeometry {
    /// A planar face bounded by curves.
    Region(CurveCollection),
    /// A single-face primitive.
    Solid(SolidPrimitive),
}

/// Closest-point result on a solid primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidLocation {
    /// Point on the surface.
    pub point: Point3,
    /// Index of the face containing the point.
    pub face: usize,
    /// First face parameter.
    pub u: f64,
    /// Second face parameter.
    pub v: f64,
    /// Unit surface normal, when defined.
    pub normal: Option<Vec3>,
}

/// Geometry of one wireframe member.
#[derive(Debug, Clone, PartialEq)]
pub enum WireGeometry {
    /// A single curve.
    Curve(CurvePrimitive),
    /// A profile or section.
    Curves(CurveCollection),
}

/// A wireframe curve of a single-face primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct WireframeMember {
    /// The curve or profile.
    pub geometry: WireGeometry,
    /// True for boundary edges, false for interior rule curves.
    pub is_edge: bool,
}

impl WireframeMember {
    fn edge(curve: CurvePrimitive) -> Self {
        Self {
            geometry: WireGeometry::Curve(curve),
            is_edge: true,
        }
    }

    fn rule(curve: CurvePrimitive) -> Self {
        Self {
            geometry: WireGeometry::Curve(curve),
            is_edge: false,
        }
    }

    fn profile(curves: CurveCollection, is_edge: bool) -> Self {
        Self {
            geometry: WireGeometry::Curves(curves),
            is_edge,
        }
    }
}

// =============================================================================
// Cone
// =============================================================================

impl ConeDetail {
    fn axis(&self) -> Vec3 {
        self.center_b - self.center_a
    }

    fn radius_at(&self, t: f64) -> f64 {
        self.radius_a + t * (self.radius_b - self.radius_a)
    }

    fn radial(&self, phi: f64) -> Vec3 {
        let (s, c) = phi.sin_cos();
        self.vector_x * c + self.vector_y * s
    }

    /// Circular section at axis fraction `t`.
    pub fn section(&self, t: f64) -> Option<Ellipse3> {
        let r = self.radius_at(t);
        if r.abs() < MIN_RADIUS {
            return None;
        }
        Some(Ellipse3::new(
            self.center_a + self.axis() * t,
            self.vector_x * r,
            self.vector_y * r,
            0.0,
            TAU,
        ))
    }

    /// Rule line at angle `phi`.
    pub fn rule(&self, phi: f64) -> Segment3 {
        let e = self.radial(phi);
        Segment3::new(self.center_a + e * self.radius_a, self.center_b + e * self.radius_b)
    }

    /// Rule lines tangent to the view direction `view_dir`.
    pub fn silhouettes(&self, view_dir: &Vec3) -> Option<[Segment3; 2]> {
        let axis = self.axis();
        let h = axis.norm();
        if h < MIN_RADIUS {
            return None;
        }
        let w = axis / h;
        let a = h * view_dir.dot(&self.vector_x);
        let b = h * view_dir.dot(&self.vector_y);
        let c = (self.radius_b - self.radius_a) * view_dir.dot(&w);
        let r = a.hypot(b);
        if r < 1e-12 || c.abs() > r {
            return None;
        }
        let phi0 = b.atan2(a);
        let delta = (c / r).clamp(-1.0, 1.0).acos();
        Some([self.rule(phi0 + delta), self.rule(phi0 - delta)])
    }

    fn closest_point(&self, p: &Point3) -> SolidLocation {
        let d = p - self.center_a;
        let (x, y) = (d.dot(&self.vector_x), d.dot(&self.vector_y));
        let phi = if x.abs() + y.abs() < 1e-300 { 0.0 } else { y.atan2(x) };
        let rule = self.rule(phi);
        let t = rule.closest_fraction(p);
        let axis = self.axis();
        let normal = axis.try_normalize(1e-30).and_then(|w| {
            (self.radial(phi) * axis.norm() - w * (self.radius_b - self.radius_a)).try_normalize(1e-30)
        });
        SolidLocation {
            point: rule.fraction_to_point(t),
            face: 0,
            u: phi.rem_euclid(TAU) / TAU,
            v: t,
            normal,
        }
    }

    fn wireframe(&self, divisor: u32, view_dir: Option<&Vec3>) -> Vec<WireframeMember> {
        let mut out = Vec::new();
        for t in [0.0, 1.0] {
            out.extend(self.section(t).map(|e| WireframeMember::edge(CurvePrimitive::Arc(e))));
        }
        let div_v = 2 * divisor.max(1);
        for k in 0..div_v {
            let rule = self.rule(TAU * k as f64 / div_v as f64);
            if rule.length() > 0.0 {
                out.push(WireframeMember::rule(CurvePrimitive::Line(rule)));
            }
        }
        if let Some(silhouettes) = view_dir.and_then(|d| self.silhouettes(d)) {
            for s in silhouettes {
                if s.length() > 0.0 {
                    out.push(WireframeMember::rule(CurvePrimitive::Line(s)));
                }
            }
        }
        out
    }
}

// =============================================================================
// Sphere
// =============================================================================

impl SphereDetail {
    fn axis_z(&self) -> Vec3 {
        self.vector_x.cross(&self.vector_y)
    }

    fn latitude_limits(&self) -> (f64, f64) {
        let a = self.latitude_start;
        let b = self.latitude_start + self.latitude_sweep;
        (a.min(b).max(-FRAC_PI_2), a.max(b).min(FRAC_PI_2))
    }

    /// True when the latitude band covers pole to pole.
    pub fn is_full(&self) -> bool {
        let (lo, hi) = self.latitude_limits();
        lo <= -FRAC_PI_2 + FULL_SWEEP_TOL && hi >= FRAC_PI_2 - FULL_SWEEP_TOL
    }

    /// Meridian arc at longitude fraction `u`.
    pub fn meridian(&self, u: f64) -> Ellipse3 {
        let (s, c) = (TAU * u).sin_cos();
        let (lo, hi) = self.latitude_limits();
        Ellipse3::new(
            self.center,
            (self.vector_x * c + self.vector_y * s) * self.radius,
            self.axis_z() * self.radius,
            lo,
            hi - lo,
        )
    }

    /// Parallel circle at `latitude`.
    pub fn parallel(&self, latitude: f64) -> Option<Ellipse3> {
        let (s, c) = latitude.sin_cos();
        let r = self.radius * c;
        if r.abs() < MIN_RADIUS {
            return None;
        }
        Some(Ellipse3::new(
            self.center + self.axis_z() * (self.radius * s),
            self.vector_x * r,
            self.vector_y * r,
            0.0,
            TAU,
        ))
    }

    fn closest_point(&self, p: &Point3) -> SolidLocation {
        let d = p - self.center;
        let (x, y, z) = (d.dot(&self.vector_x), d.dot(&self.vector_y), d.dot(&self.axis_z()));
        let theta = if x.abs() + y.abs() < 1e-300 { 0.0 } else { y.atan2(x) };
        let (lo, hi) = self.latitude_limits();
        let latitude = z.atan2(x.hypot(y)).clamp(lo, hi);
        let (sl, cl) = latitude.sin_cos();
        let (st, ct) = theta.sin_cos();
        let dir = (self.vector_x * ct + self.vector_y * st) * cl + self.axis_z() * sl;
        SolidLocation {
            point: self.center + dir * self.radius,
            face: 0,
            u: theta.rem_euclid(TAU) / TAU,
            v: (latitude + FRAC_PI_2) / PI,
            normal: dir.try_normalize(1e-30),
        }
    }

    fn wireframe(&self, divisor: u32) -> Vec<WireframeMember> {
        let mut out = Vec::new();
        let div_u = 2 * divisor.max(1);
        for k in 0..div_u {
            out.push(WireframeMember::rule(CurvePrimitive::Arc(
                self.meridian(k as f64 / div_u as f64),
            )));
        }
        let full = self.is_full();
        let div_v = if full { 2 } else { divisor.max(1) };
        let (lo, hi) = self.latitude_limits();
        for k in 0..=div_v {
            if full && (k == 0 || k == div_v) {
                continue;
            }
            let latitude = lo + (hi - lo) * k as f64 / div_v as f64;
            out.extend(
                self.parallel(latitude)
                    .map(|e| WireframeMember::rule(CurvePrimitive::Arc(e))),
            );
        }
        out
    }
}

// =============================================================================
// Torus
// =============================================================================

impl TorusPipeDetail {
    fn axis_z(&self) -> Vec3 {
        self.vector_x.cross(&self.vector_y)
    }

    fn radial(&self, theta: f64) -> Vec3 {
        let (s, c) = theta.sin_cos();
        self.vector_x * c + self.vector_y * s
    }

    /// Arc along the sweep at pipe angle `2π·u`.
    pub fn ring_arc(&self, u: f64) -> Option<Ellipse3> {
        let (s, c) = (TAU * u).sin_cos();
        let r = self.major_radius + self.minor_radius * c;
        if r.abs() < MIN_RADIUS {
            return None;
        }
        Some(Ellipse3::new(
            self.center + self.axis_z() * (self.minor_radius * s),
            self.vector_x * r,
            self.vector_y * r,
            0.0,
            self.sweep,
        ))
    }

    /// Pipe cross-section at sweep fraction `v`.
    pub fn pipe_section(&self, v: f64) -> Ellipse3 {
        let radial = self.radial(v * self.sweep);
        Ellipse3::new(
            self.center + radial * self.major_radius,
            radial * self.minor_radius,
            self.axis_z() * self.minor_radius,
            0.0,
            TAU,
        )
    }

    fn closest_point(&self, p: &Point3) -> SolidLocation {
        let d = p - self.center;
        let (x, y) = (d.dot(&self.vector_x), d.dot(&self.vector_y));
        let theta = clamp_to_sweep(if x.abs() + y.abs() < 1e-300 { 0.0 } else { y.atan2(x) }, self.sweep);
        let radial = self.radial(theta);
        let ring = self.center + radial * self.major_radius;
        let q = p - ring;
        let (a, b) = (q.dot(&radial), q.dot(&self.axis_z()));
        let phi = if a.abs() + b.abs() < 1e-300 { 0.0 } else { b.atan2(a) };
        let (s, c) = phi.sin_cos();
        let dir = radial * c + self.axis_z() * s;
        SolidLocation {
            point: ring + dir * self.minor_radius,
            face: 0,
            u: phi.rem_euclid(TAU) / TAU,
            v: if self.sweep.abs() > 0.0 { theta / self.sweep } else { 0.0 },
            normal: dir.try_normalize(1e-30),
        }
    }

    fn wireframe(&self, divisor: u32) -> Vec<WireframeMember> {
        let mut out = Vec::new();
        for k in 0..4 {
            out.extend(
                self.ring_arc(k as f64 / 4.0)
                    .map(|e| WireframeMember::rule(CurvePrimitive::Arc(e))),
            );
        }
        let full = is_full_sweep(self.sweep);
        let div_v = if full { 2 * divisor.max(1) } else { divisor.max(1) };
        for k in 0..=div_v {
            if full && k == div_v {
                continue;
            }
            let is_edge = !full && (k == 0 || k == div_v);
            out.push(WireframeMember {
                geometry: WireGeometry::Curve(CurvePrimitive::Arc(
                    self.pipe_section(k as f64 / div_v as f64),
                )),
                is_edge,
            });
        }
        out
    }
}

// =============================================================================
// Swept profiles
// =============================================================================

/// Seeded golden-section search over a curve fraction; `eval` maps a
/// fraction to the second surface parameter and the surface point nearest
/// `p` along that rule.
fn minimize_over_fraction(
    p: &Point3,
    eval: impl Fn(f64) -> Option<(f64, Point3)>,
) -> Option<(f64, f64, Point3)> {
    let dist = |f: f64| eval(f).map_or(f64::INFINITY, |(_, q)| (q - p).norm_squared());
    let best = (0..=SWEEP_SAMPLES)
        .map(|i| i as f64 / SWEEP_SAMPLES as f64)
        .min_by(|a, b| dist(*a).total_cmp(&dist(*b)))?;
    let step = 1.0 / SWEEP_SAMPLES as f64;
    let f = minimize_on_interval((best - step).max(0.0), (best + step).min(1.0), &dist);
    let (s, q) = eval(f)?;
    Some((f, s, q))
}

/// Rule points paired across two sections. A second section collapsed to a
/// single point is repeated for every rule on the first.
fn pair_points(first: Vec<Point3>, mut second: Vec<Point3>) -> Vec<(Point3, Point3)> {
    if first.len() != second.len() {
        match second.as_slice() {
            [only] if !first.is_empty() => second = vec![*only; first.len()],
            _ => return Vec::new(),
        }
    }
    first.into_iter().zip(second).collect()
}

/// Rule points of a ruled-sweep section; a section collapsed to a point
/// yields that point.
fn section_rule_points(section: &CurveCollection, divisor: u32) -> Vec<Point3> {
    let range = section.range();
    if !range.is_null() && (range.high - range.low).norm() < 1e-12 {
        return vec![range.low];
    }
    section.rule_points(divisor, 2 * divisor)
}

fn pair_primitives<'a>(
    a: &'a CurveCollection,
    b: &'a CurveCollection,
) -> Vec<(&'a CurvePrimitive, &'a CurvePrimitive)> {
    let (pa, pb) = (a.primitives(), b.primitives());
    if pa.len() != pb.len() {
        return Vec::new();
    }
    pa.into_iter().zip(pb).collect()
}

impl ExtrusionDetail {
    fn closest_point(&self, p: &Point3) -> Option<SolidLocation> {
        let vv = self.vector.norm_squared();
        self.base
            .primitives()
            .into_iter()
            .filter_map(|prim| {
                let (f, t, point) = minimize_over_fraction(p, |f| {
                    let q = prim.fraction_to_point(f)?;
                    let t = if vv > 0.0 { ((p - q).dot(&self.vector) / vv).clamp(0.0, 1.0) } else { 0.0 };
                    Some((t, q + self.vector * t))
                })?;
                let normal = prim
                    .fraction_to_tangent(f)
                    .and_then(|d| d.cross(&self.vector).try_normalize(1e-30));
                Some(SolidLocation { point, face: 0, u: f, v: t, normal })
            })
            .min_by(|a, b| (a.point - p).norm_squared().total_cmp(&(b.point - p).norm_squared()))
    }

    fn wireframe(&self, divisor: u32) -> Vec<WireframeMember> {
        let divisor = divisor.max(1);
        let shift = Transform::translation(self.vector.x, self.vector.y, self.vector.z);
        let mut out = vec![
            WireframeMember::profile(self.base.clone(), true),
            WireframeMember::profile(self.base.transformed(&shift), true),
        ];
        for q in self.base.break_points() {
            out.push(WireframeMember::edge(CurvePrimitive::line(q, q + self.vector)));
        }
        for q in self.base.rule_points(divisor, 2 * divisor) {
            out.push(WireframeMember::rule(CurvePrimitive::line(q, q + self.vector)));
        }
        out
    }
}

impl RotationalSweepDetail {
    fn axis(&self) -> Option<Dir3> {
        Dir3::try_new(self.axis_direction, 1e-30)
    }

    fn rotation(&self, angle: f64) -> Option<Transform> {
        Some(Transform::rotation_about_line(&self.axis_origin, &self.axis()?, angle))
    }

    /// Circle arc traced by `q` over the sweep; `None` for points on the axis.
    pub fn rule_arc(&self, q: &Point3) -> Option<Ellipse3> {
        let axis = self.axis()?;
        let h = (q - self.axis_origin).dot(axis.as_ref());
        let center = self.axis_origin + axis.as_ref() * h;
        let radial = q - center;
        if radial.norm() < 1e-8 {
            return None;
        }
        Some(Ellipse3::new(center, radial, axis.cross(&radial), 0.0, self.sweep))
    }

    /// Profile rotated to sweep fraction `v`.
    pub fn profile_at(&self, v: f64) -> Option<CurveCollection> {
        Some(self.base.transformed(&self.rotation(v * self.sweep)?))
    }

    fn closest_point(&self, p: &Point3) -> Option<SolidLocation> {
        let axis = self.axis()?;
        let a = axis.into_inner();
        let dp = p - self.axis_origin;
        let rp = dp - a * dp.dot(&a);
        let angle_to = |q: &Point3| {
            let d = q - self.axis_origin;
            let rq = d - a * d.dot(&a);
            if rq.norm() < 1e-12 || rp.norm() < 1e-12 {
                return 0.0;
            }
            clamp_to_sweep(rq.cross(&rp).dot(&a).atan2(rq.dot(&rp)), self.sweep)
        };
        self.base
            .primitives()
            .into_iter()
            .filter_map(|prim| {
                let (f, theta, point) = minimize_over_fraction(p, |f| {
                    let q = prim.fraction_to_point(f)?;
                    let theta = angle_to(&q);
                    Some((theta, self.rotation(theta)?.apply_point(&q)))
                })?;
                let rot = self.rotation(theta)?;
                let normal = prim.fraction_to_tangent(f).and_then(|d| {
                    let along = rot.apply_vec(&d);
                    let around = a.cross(&(point - self.axis_origin));
                    along.cross(&around).try_normalize(1e-30)
                });
                let v = if self.sweep.abs() > 0.0 { theta / self.sweep } else { 0.0 };
                Some(SolidLocation { point, face: 0, u: f, v, normal })
            })
            .min_by(|a, b| (a.point - p).norm_squared().total_cmp(&(b.point - p).norm_squared()))
    }

    fn wireframe(&self, divisor: u32) -> Vec<WireframeMember> {
        let divisor = divisor.max(1);
        let full = is_full_sweep(self.sweep);
        let mut out = Vec::new();
        if !full {
            out.push(WireframeMember::profile(self.base.clone(), true));
            out.extend(
                self.profile_at(1.0)
                    .map(|c| WireframeMember::profile(c, true)),
            );
        }
        for q in self.base.break_points() {
            out.extend(self.rule_arc(&q).map(|e| WireframeMember::edge(CurvePrimitive::Arc(e))));
        }
        for q in self.base.rule_points(divisor, 4) {
            out.extend(self.rule_arc(&q).map(|e| WireframeMember::rule(CurvePrimitive::Arc(e))));
        }
        let div_v = if full { 2 * divisor } else { divisor };
        for k in 0..div_v {
            if !full && k == 0 {
                continue;
            }
            out.extend(
                self.profile_at(k as f64 / div_v as f64)
                    .map(|c| WireframeMember::profile(c, false)),
            );
        }
        out
    }
}

impl RuledSweepDetail {
    fn closest_point(&self, p: &Point3) -> Option<SolidLocation> {
        self.sections
            .windows(2)
            .flat_map(|pair| pair_primitives(&pair[0], &pair[1]))
            .filter_map(|(c0, c1)| {
                let (f, t, point) = minimize_over_fraction(p, |f| {
                    let q0 = c0.fraction_to_point(f)?;
                    let q1 = c1.fraction_to_point(f)?;
                    let rule = Segment3::new(q0, q1);
                    let t = rule.closest_fraction(p);
                    Some((t, rule.fraction_to_point(t)))
                })?;
                let normal = match (
                    c0.fraction_to_tangent(f),
                    c1.fraction_to_tangent(f),
                    c0.fraction_to_point(f),
                    c1.fraction_to_point(f),
                ) {
                    (Some(d0), Some(d1), Some(q0), Some(q1)) => {
                        (d0 * (1.0 - t) + d1 * t).cross(&(q1 - q0)).try_normalize(1e-30)
                    }
                    _ => None,
                };
                Some(SolidLocation { point, face: 0, u: f, v: t, normal })
            })
            .min_by(|a, b| (a.point - p).norm_squared().total_cmp(&(b.point - p).norm_squared()))
    }

    fn wireframe(&self, divisor: u32) -> Vec<WireframeMember> {
        let divisor = divisor.max(1);
        let mut out: Vec<WireframeMember> = self
            .sections
            .iter()
            .map(|s| WireframeMember::profile(s.clone(), true))
            .collect();
        for pair in self.sections.windows(2) {
            for (a, b) in pair_points(pair[0].break_points(), pair[1].break_points()) {
                out.push(WireframeMember::edge(CurvePrimitive::line(a, b)));
            }
        }
        for pair in self.sections.windows(2) {
            let rules = pair_points(
                section_rule_points(&pair[0], divisor),
                section_rule_points(&pair[1], divisor),
            );
            for (a, b) in rules {
                if (b - a).norm() > 0.0 {
                    out.push(WireframeMember::rule(CurvePrimitive::line(a, b)));
                }
            }
        }
        out
    }
}

// =============================================================================
// SolidPrimitive
// =============================================================================

impl SolidPrimitive {
    /// True for closed volumes.
    pub fn is_capped(&self) -> bool {
        match self {
            Self::Cone(d) => d.capped,
            Self::Sphere(d) => d.capped || d.is_full(),
            Self::TorusPipe(d) => d.capped || is_full_sweep(d.sweep),
            Self::Extrusion(d) => d.capped,
            Self::RotationalSweep(d) => d.capped,
            Self::RuledSweep(d) => d.capped,
        }
    }

    /// Face decomposition: lateral faces first, then caps. A primitive with
    /// one face returns itself.
    pub fn faces(&self) -> Vec<FaceGeometry> {
        let mut laterals: Vec<FaceGeometry> = Vec::new();
        let mut caps: Vec<CurveCollection> = Vec::new();
        let disk = |e: Ellipse3| CurveCollection::outer(vec![CurvePrimitive::Arc(e)]);
        match self {
            Self::Cone(d) => {
                laterals.push(FaceGeometry::Solid(Self::Cone(ConeDetail { capped: false, ..d.clone() })));
                if d.capped {
                    caps.extend(d.section(0.0).map(disk));
                    caps.extend(d.section(1.0).map(disk));
                }
            }
            Self::Sphere(d) => {
                laterals.push(FaceGeometry::Solid(Self::Sphere(SphereDetail { capped: false, ..d.clone() })));
                if d.capped && !d.is_full() {
                    let (lo, hi) = d.latitude_limits();
                    caps.extend(d.parallel(lo).map(disk));
                    caps.extend(d.parallel(hi).map(disk));
                }
            }
            Self::TorusPipe(d) => {
                laterals.push(FaceGeometry::Solid(Self::TorusPipe(TorusPipeDetail { capped: false, ..d.clone() })));
                if d.capped && !is_full_sweep(d.sweep) {
                    caps.push(disk(d.pipe_section(0.0)));
                    caps.push(disk(d.pipe_section(1.0)));
                }
            }
            Self::Extrusion(d) => {
                for prim in d.base.primitives() {
                    laterals.push(FaceGeometry::Solid(Self::Extrusion(ExtrusionDetail {
                        base: CurveCollection::open(vec![prim.clone()]),
                        vector: d.vector,
                        capped: false,
                    })));
                }
                if d.capped && d.base.is_any_region() {
                    let shift = Transform::translation(d.vector.x, d.vector.y, d.vector.z);
                    caps.push(d.base.clone());
                    caps.push(d.base.transformed(&shift));
                }
            }
            Self::RotationalSweep(d) => {
                for prim in d.base.primitives() {
                    laterals.push(FaceGeometry::Solid(Self::RotationalSweep(RotationalSweepDetail {
                        base: CurveCollection::open(vec![prim.clone()]),
                        capped: false,
                        ..d.clone()
                    })));
                }
                if d.capped && d.base.is_any_region() && !is_full_sweep(d.sweep) {
                    caps.push(d.base.clone());
                    caps.extend(d.profile_at(1.0));
                }
            }
            Self::RuledSweep(d) => {
                for pair in d.sections.windows(2) {
                    for (a, b) in pair_primitives(&pair[0], &pair[1]) {
                        laterals.push(FaceGeometry::Solid(Self::RuledSweep(RuledSweepDetail {
                            sections: vec![
                                CurveCollection::open(vec![a.clone()]),
                                CurveCollection::open(vec![b.clone()]),
                            ],
                            capped: false,
                        })));
                    }
                }
                if d.capped {
                    let ends = [d.sections.first(), d.sections.last()];
                    caps.extend(ends.into_iter().flatten().filter(|s| s.is_any_region()).cloned());
                }
            }
        }
        if laterals.len() == 1 && caps.is_empty() {
            return vec![FaceGeometry::Solid(self.clone())];
        }
        laterals.extend(caps.into_iter().map(FaceGeometry::Region));
        laterals
    }

    /// Face by index.
    pub fn face(&self, index: usize) -> Option<FaceGeometry> {
        self.faces().into_iter().nth(index)
    }

    /// Closest point over all faces.
    pub fn closest_point(&self, p: &Point3) -> Option<SolidLocation> {
        let faces = self.faces();
        if faces.len() < 2 {
            return self.closest_point_single_face(p);
        }
        faces
            .iter()
            .enumerate()
            .filter_map(|(index, face)| {
                let loc = match face {
                    FaceGeometry::Solid(s) => s.closest_point_single_face(p)?,
                    FaceGeometry::Region(region) => {
                        let point = region.closest_curve_or_region_point(p)?;
                        let plane = region.plane(&Vec3::z())?;
                        let uv = plane.project(&point);
                        SolidLocation {
                            point,
                            face: 0,
                            u: uv.x,
                            v: uv.y,
                            normal: Some(plane.normal_dir.into_inner()),
                        }
                    }
                };
                Some(SolidLocation { face: index, ..loc })
            })
            .min_by(|a, b| (a.point - p).norm_squared().total_cmp(&(b.point - p).norm_squared()))
    }

    fn closest_point_single_face(&self, p: &Point3) -> Option<SolidLocation> {
        match self {
            Self::Cone(d) => Some(d.closest_point(p)),
            Self::Sphere(d) => Some(d.closest_point(p)),
            Self::TorusPipe(d) => Some(d.closest_point(p)),
            Self::Extrusion(d) => d.closest_point(p),
            Self::RotationalSweep(d) => d.closest_point(p),
            Self::RuledSweep(d) => d.closest_point(p),
        }
    }

    /// Edges and rule curves of a single-face primitive. `view_dir` is the
    /// local eye direction used for cone silhouettes.
    pub fn single_face_wireframe(&self, divisor: u32, view_dir: Option<&Vec3>) -> Vec<WireframeMember> {
        match self {
            Self::Cone(d) => d.wireframe(divisor, view_dir),
            Self::Sphere(d) => d.wireframe(divisor),
            Self::TorusPipe(d) => d.wireframe(divisor),
            Self::Extrusion(d) => d.wireframe(divisor),
            Self::RotationalSweep(d) => d.wireframe(divisor),
            Self::RuledSweep(d) => d.wireframe(divisor),
        }
    }

    /// Copy mapped by `t` (rigid or uniformly scaled transforms).
    pub fn transformed(&self, t: &Transform) -> Self {
        let scale = t.apply_vec(&Vec3::x()).norm();
        match self {
            Self::Cone(d) => Self::Cone(ConeDetail {
                center_a: t.apply_point(&d.center_a),
                center_b: t.apply_point(&d.center_b),
                vector_x: t.apply_vec(&d.vector_x) / scale,
                vector_y: t.apply_vec(&d.vector_y) / scale,
                radius_a: d.radius_a * scale,
                radius_b: d.radius_b * scale,
                capped: d.capped,
            }),
            Self::Sphere(d) => Self::Sphere(SphereDetail {
                center: t.apply_point(&d.center),
                vector_x: t.apply_vec(&d.vector_x) / scale,
                vector_y: t.apply_vec(&d.vector_y) / scale,
                radius: d.radius * scale,
                ..d.clone()
            }),
            Self::TorusPipe(d) => Self::TorusPipe(TorusPipeDetail {
                center: t.apply_point(&d.center),
                vector_x: t.apply_vec(&d.vector_x) / scale,
                vector_y: t.apply_vec(&d.vector_y) / scale,
                major_radius: d.major_radius * scale,
                minor_radius: d.minor_radius * scale,
                ..d.clone()
            }),
            Self::Extrusion(d) => Self::Extrusion(ExtrusionDetail {
                base: d.base.transformed(t),
                vector: t.apply_vec(&d.vector),
                capped: d.capped,
            }),
            Self::RotationalSweep(d) => Self::RotationalSweep(RotationalSweepDetail {
                base: d.base.transformed(t),
                axis_origin: t.apply_point(&d.axis_origin),
                axis_direction: t.apply_vec(&d.axis_direction),
                ..d.clone()
            }),
            Self::RuledSweep(d) => Self::RuledSweep(RuledSweepDetail {
                sections: d.sections.iter().map(|s| s.transformed(t)).collect(),
                capped: d.capped,
            }),
        }
    }

    /// Range of the wireframe.
    pub fn range(&self) -> Range3 {
        let mut range = Range3::null();
        for member in self.single_face_wireframe(4, None) {
            match member.geometry {
                WireGeometry::Curve(c) => range.extend(&c.range()),
                WireGeometry::Curves(c) => range.extend(&c.range()),
            }
        }
        range
    }
}
