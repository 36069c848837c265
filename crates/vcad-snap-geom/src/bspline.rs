//! Non-rational and rational B-spline curves, and B-spline surfaces.
//!
//! Curves and surfaces are addressed by *fraction* in `[0, 1]` over the
//! clamped knot domain; knot values only appear inside this module.

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Point3, Range3, Transform, Vec3};

use crate::curve::{minimize_on_interval, CurveLocation};

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> bool {
    if n_points <= degree || knots.len() != n_points + degree + 1 {
        return false;
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return false;
    }
    knots[n_points] > knots[degree]
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Non-zero basis function values `N[span-degree..=span]` at `t`.
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() < 1e-30 {
                continue;
            }
            let temp = n[r] / denom;
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Number of non-empty knot intervals inside the domain.
fn span_count(knots: &[f64], n_points: usize, degree: usize) -> usize {
    (degree..n_points)
        .filter(|&i| knots[i + 1] > knots[i])
        .count()
        .max(1)
}

/// Clamped knot vector with uniform interior spacing over `[0, 1]`.
fn clamped_uniform_knots(n_points: usize, degree: usize) -> Vec<f64> {
    let m = n_points + degree + 1;
    let mut knots = vec![0.0; m];
    let n_internal = m.saturating_sub(2 * (degree + 1));
    for i in 0..=degree {
        knots[m - 1 - i] = 1.0;
    }
    for i in 1..=n_internal {
        knots[degree + i] = i as f64 / (n_internal + 1) as f64;
    }
    knots
}

// =============================================================================
// B-spline curve
// =============================================================================

/// A B-spline curve in 3D, optionally rational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BSplineCurve {
    /// Control points (poles).
    pub poles: Vec<Point3>,
    /// Knot vector. Length = poles.len() + degree + 1.
    pub knots: Vec<f64>,
    /// Polynomial degree (order = degree + 1).
    pub degree: usize,
    /// Pole weights; `None` for a non-rational curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    /// Whether the curve closes on itself.
    #[serde(default)]
    pub closed: bool,
}

impl BSplineCurve {
    /// Create a non-rational B-spline curve, validating the knot vector.
    pub fn new(poles: Vec<Point3>, knots: Vec<f64>, degree: usize) -> Option<Self> {
        if !validate_knots(&knots, poles.len(), degree) {
            return None;
        }
        Some(Self {
            poles,
            knots,
            degree,
            weights: None,
            closed: false,
        })
    }

    /// Create a clamped uniform B-spline with the given degree.
    pub fn clamped_uniform(poles: Vec<Point3>, degree: usize) -> Option<Self> {
        let knots = clamped_uniform_knots(poles.len(), degree);
        Self::new(poles, knots, degree)
    }

    /// Mark the curve closed.
    pub fn into_closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Order (degree + 1).
    pub fn order(&self) -> usize {
        self.degree + 1
    }

    /// True when the knots and weights are consistent with the poles.
    pub fn is_valid(&self) -> bool {
        validate_knots(&self.knots, self.poles.len(), self.degree)
            && self
                .weights
                .as_ref()
                .map_or(true, |w| w.len() == self.poles.len() && w.iter().all(|&x| x > 0.0))
    }

    /// True when weights are present and not all equal.
    pub fn is_rational(&self) -> bool {
        match &self.weights {
            Some(w) => w.iter().any(|&x| (x - w[0]).abs() > 1e-12),
            None => false,
        }
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.poles.len()])
    }

    fn eval_knot(&self, t: f64) -> Point3 {
        let n = self.poles.len() - 1;
        let (t0, t1) = self.domain();
        let t = t.clamp(t0, t1);
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);

        let mut sum = Vec3::zeros();
        let mut weight_sum = 0.0;
        for (i, &b) in basis.iter().enumerate() {
            let idx = span - self.degree + i;
            let w = self.weights.as_ref().map_or(1.0, |w| w[idx]);
            sum += self.poles[idx].coords * (b * w);
            weight_sum += b * w;
        }
        if weight_sum.abs() < 1e-30 {
            return self.poles[span];
        }
        Point3::from(sum / weight_sum)
    }

    /// Point at a fraction of the parameter domain.
    pub fn fraction_to_point(&self, fraction: f64) -> Option<Point3> {
        if !self.is_valid() {
            return None;
        }
        let (t0, t1) = self.domain();
        Some(self.eval_knot(t0 + fraction.clamp(0.0, 1.0) * (t1 - t0)))
    }

    /// Derivative with respect to fraction (central differences).
    pub fn fraction_to_tangent(&self, fraction: f64) -> Option<Vec3> {
        let h = 1e-6;
        let a = (fraction - h).max(0.0);
        let b = (fraction + h).min(1.0);
        Some((self.fraction_to_point(b)? - self.fraction_to_point(a)?) / (b - a))
    }

    /// Evenly spaced samples in fraction, `count + 1` points.
    pub fn sample(&self, count: usize) -> Vec<(f64, Point3)> {
        if !self.is_valid() {
            return Vec::new();
        }
        let (t0, t1) = self.domain();
        (0..=count)
            .map(|i| {
                let f = i as f64 / count as f64;
                (f, self.eval_knot(t0 + f * (t1 - t0)))
            })
            .collect()
    }

    fn dense_sample_count(&self) -> usize {
        (64 * span_count(&self.knots, self.poles.len(), self.degree)).min(8192)
    }

    /// Closest point on the curve, bounded to its domain.
    pub fn closest_point_bounded(&self, p: &Point3) -> Option<CurveLocation> {
        let count = (16 * span_count(&self.knots, self.poles.len(), self.degree)).clamp(32, 2048);
        let samples = self.sample(count);
        let (best, _) = samples
            .iter()
            .enumerate()
            .map(|(i, (_, q))| (i, (q - p).norm_squared()))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let step = 1.0 / count as f64;
        let lo = (samples[best].0 - step).max(0.0);
        let hi = (samples[best].0 + step).min(1.0);
        let fraction = minimize_on_interval(lo, hi, |f| {
            self.fraction_to_point(f)
                .map_or(f64::INFINITY, |q| (q - p).norm_squared())
        });
        let point = self.fraction_to_point(fraction)?;
        Some(CurveLocation::new(fraction, point).measured_from(p))
    }

    /// Cumulative chord lengths at dense samples.
    fn length_table(&self) -> Vec<(f64, f64)> {
        let samples = self.sample(self.dense_sample_count());
        let mut table = Vec::with_capacity(samples.len());
        let mut total = 0.0;
        for (i, (f, q)) in samples.iter().enumerate() {
            if i > 0 {
                total += (q - samples[i - 1].1).norm();
            }
            table.push((*f, total));
        }
        table
    }

    /// Arc length of the whole curve.
    pub fn length(&self) -> Option<f64> {
        self.length_table().last().map(|&(_, l)| l)
    }

    /// Signed arc length from fraction `f0` to `f1`.
    pub fn length_between(&self, f0: f64, f1: f64) -> Option<f64> {
        let table = self.length_table();
        let at = |f: f64| interpolate_table(&table, f, |e| e.0, |e| e.1);
        Some(at(f1)? - at(f0)?)
    }

    /// Fraction at arc length `distance` from the start, clamped to the curve.
    pub fn fraction_at_distance(&self, distance: f64) -> Option<f64> {
        let table = self.length_table();
        interpolate_table(&table, distance, |e| e.1, |e| e.0)
    }

    /// Transform every pole.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            poles: self.poles.iter().map(|p| t.apply_point(p)).collect(),
            ..self.clone()
        }
    }

    /// Range of the control polygon (contains the curve).
    pub fn range(&self) -> Range3 {
        Range3::from_points(self.poles.iter())
    }
}

/// Piecewise-linear lookup in a monotone table.
fn interpolate_table<E>(
    table: &[E],
    x: f64,
    key: impl Fn(&E) -> f64,
    value: impl Fn(&E) -> f64,
) -> Option<f64> {
    let first = table.first()?;
    let last = table.last()?;
    if x <= key(first) {
        return Some(value(first));
    }
    if x >= key(last) {
        return Some(value(last));
    }
    let i = table.partition_point(|e| key(e) < x).max(1);
    let (a, b) = (&table[i - 1], &table[i]);
    let span = key(b) - key(a);
    if span <= 0.0 {
        return Some(value(a));
    }
    let s = (x - key(a)) / span;
    Some(value(a) + s * (value(b) - value(a)))
}

// =============================================================================
// B-spline surface
// =============================================================================

/// Closest-point result on a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceLocation {
    /// Fraction in u.
    pub u: f64,
    /// Fraction in v.
    pub v: f64,
    /// Point on the surface.
    pub point: Point3,
    /// Unit normal, when the partials are independent.
    pub normal: Option<Vec3>,
}

/// A non-rational tensor-product B-spline surface.
///
/// Poles are stored in row-major order: `poles[v_idx * n_u + u_idx]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BSplineSurface {
    /// Poles in row-major order.
    pub poles: Vec<Point3>,
    /// Number of poles in the u direction.
    pub n_u: usize,
    /// Number of poles in the v direction.
    pub n_v: usize,
    /// Knot vector in u. Length = n_u + degree_u + 1.
    pub knots_u: Vec<f64>,
    /// Knot vector in v. Length = n_v + degree_v + 1.
    pub knots_v: Vec<f64>,
    /// Polynomial degree in u.
    pub degree_u: usize,
    /// Polynomial degree in v.
    pub degree_v: usize,
    /// Whether the surface closes in u.
    #[serde(default)]
    pub closed_u: bool,
    /// Whether the surface closes in v.
    #[serde(default)]
    pub closed_v: bool,
}

impl BSplineSurface {
    /// Create a surface with clamped uniform knots in both directions.
    pub fn clamped_uniform(
        poles: Vec<Point3>,
        n_u: usize,
        n_v: usize,
        degree_u: usize,
        degree_v: usize,
    ) -> Option<Self> {
        let surface = Self {
            poles,
            n_u,
            n_v,
            knots_u: clamped_uniform_knots(n_u, degree_u),
            knots_v: clamped_uniform_knots(n_v, degree_v),
            degree_u,
            degree_v,
            closed_u: false,
            closed_v: false,
        };
        surface.is_valid().then_some(surface)
    }

    /// True when both knot vectors match the pole grid.
    pub fn is_valid(&self) -> bool {
        self.poles.len() == self.n_u * self.n_v
            && validate_knots(&self.knots_u, self.n_u, self.degree_u)
            && validate_knots(&self.knots_v, self.n_v, self.degree_v)
    }

    fn pole(&self, u_idx: usize, v_idx: usize) -> &Point3 {
        &self.poles[v_idx * self.n_u + u_idx]
    }

    fn knot_u(&self, fraction: f64) -> f64 {
        let (a, b) = (self.knots_u[self.degree_u], self.knots_u[self.n_u]);
        a + fraction.clamp(0.0, 1.0) * (b - a)
    }

    fn knot_v(&self, fraction: f64) -> f64 {
        let (a, b) = (self.knots_v[self.degree_v], self.knots_v[self.n_v]);
        a + fraction.clamp(0.0, 1.0) * (b - a)
    }

    fn eval(&self, u: f64, v: f64) -> Point3 {
        let (tu, tv) = (self.knot_u(u), self.knot_v(v));
        let span_u = find_span(&self.knots_u, self.n_u - 1, self.degree_u, tu);
        let span_v = find_span(&self.knots_v, self.n_v - 1, self.degree_v, tv);
        let basis_u = basis_functions(&self.knots_u, span_u, self.degree_u, tu);
        let basis_v = basis_functions(&self.knots_v, span_v, self.degree_v, tv);

        let mut sum = Vec3::zeros();
        for (j, &bv) in basis_v.iter().enumerate() {
            let v_idx = span_v - self.degree_v + j;
            for (i, &bu) in basis_u.iter().enumerate() {
                let u_idx = span_u - self.degree_u + i;
                sum += self.pole(u_idx, v_idx).coords * (bu * bv);
            }
        }
        Point3::from(sum)
    }

    /// Point at fractions `(u, v)`.
    pub fn point_at(&self, u: f64, v: f64) -> Option<Point3> {
        self.is_valid().then(|| self.eval(u, v))
    }

    fn partials(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let h = 1e-6;
        let (u0, u1) = ((u - h).max(0.0), (u + h).min(1.0));
        let (v0, v1) = ((v - h).max(0.0), (v + h).min(1.0));
        let du = (self.eval(u1, v) - self.eval(u0, v)) / (u1 - u0);
        let dv = (self.eval(u, v1) - self.eval(u, v0)) / (v1 - v0);
        (du, dv)
    }

    /// Unit normal at fractions `(u, v)`.
    pub fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        if !self.is_valid() {
            return None;
        }
        let (du, dv) = self.partials(u, v);
        du.cross(&dv).try_normalize(1e-30)
    }

    /// Closest point on the surface to `p`.
    pub fn closest_point(&self, p: &Point3) -> Option<SurfaceLocation> {
        if !self.is_valid() {
            return None;
        }
        let nu = (8 * span_count(&self.knots_u, self.n_u, self.degree_u)).clamp(8, 64);
        let nv = (8 * span_count(&self.knots_v, self.n_v, self.degree_v)).clamp(8, 64);
        let mut best = (0.0, 0.0, f64::INFINITY);
        for j in 0..=nv {
            for i in 0..=nu {
                let (u, v) = (i as f64 / nu as f64, j as f64 / nv as f64);
                let d = (self.eval(u, v) - p).norm_squared();
                if d < best.2 {
                    best = (u, v, d);
                }
            }
        }

        // Gauss-Newton on the foot-point condition, clamped to the domain.
        let (mut u, mut v) = (best.0, best.1);
        for _ in 0..24 {
            let r = self.eval(u, v) - p;
            let (su, sv) = self.partials(u, v);
            let (a, b, c) = (su.dot(&su), su.dot(&sv), sv.dot(&sv));
            let det = a * c - b * b;
            if det.abs() < 1e-30 {
                break;
            }
            let (ru, rv) = (r.dot(&su), r.dot(&sv));
            let step_u = -(c * ru - b * rv) / det;
            let step_v = -(a * rv - b * ru) / det;
            let next_u = (u + step_u).clamp(0.0, 1.0);
            let next_v = (v + step_v).clamp(0.0, 1.0);
            let moved = (next_u - u).abs() + (next_v - v).abs();
            u = next_u;
            v = next_v;
            if moved < 1e-13 {
                break;
            }
        }
        if (self.eval(u, v) - p).norm_squared() > best.2 {
            u = best.0;
            v = best.1;
        }
        Some(SurfaceLocation {
            u,
            v,
            point: self.eval(u, v),
            normal: self.normal_at(u, v),
        })
    }

    /// Iso-parametric curve at fixed u fraction, running along v.
    pub fn curve_at_u(&self, u: f64) -> Option<BSplineCurve> {
        if !self.is_valid() {
            return None;
        }
        let t = self.knot_u(u);
        let span = find_span(&self.knots_u, self.n_u - 1, self.degree_u, t);
        let basis = basis_functions(&self.knots_u, span, self.degree_u, t);
        let poles = (0..self.n_v)
            .map(|j| {
                let mut sum = Vec3::zeros();
                for (i, &b) in basis.iter().enumerate() {
                    sum += self.pole(span - self.degree_u + i, j).coords * b;
                }
                Point3::from(sum)
            })
            .collect();
        let mut curve = BSplineCurve::new(poles, self.knots_v.clone(), self.degree_v)?;
        curve.closed = self.closed_v;
        Some(curve)
    }

    /// Iso-parametric curve at fixed v fraction, running along u.
    pub fn curve_at_v(&self, v: f64) -> Option<BSplineCurve> {
        if !self.is_valid() {
            return None;
        }
        let t = self.knot_v(v);
        let span = find_span(&self.knots_v, self.n_v - 1, self.degree_v, t);
        let basis = basis_functions(&self.knots_v, span, self.degree_v, t);
        let poles = (0..self.n_u)
            .map(|i| {
                let mut sum = Vec3::zeros();
                for (j, &b) in basis.iter().enumerate() {
                    sum += self.pole(i, span - self.degree_v + j).coords * b;
                }
                Point3::from(sum)
            })
            .collect();
        let mut curve = BSplineCurve::new(poles, self.knots_u.clone(), self.degree_u)?;
        curve.closed = self.closed_u;
        Some(curve)
    }

    /// Boundary curves along the open directions.
    pub fn boundary_curves(&self) -> Vec<BSplineCurve> {
        let mut curves = Vec::new();
        if !self.closed_u {
            curves.extend(self.curve_at_u(0.0));
            curves.extend(self.curve_at_u(1.0));
        }
        if !self.closed_v {
            curves.extend(self.curve_at_v(0.0));
            curves.extend(self.curve_at_v(1.0));
        }
        curves
    }

    /// Range of the control net (contains the surface).
    pub fn range(&self) -> Range3 {
        Range3::from_points(self.poles.iter())
    }
}
