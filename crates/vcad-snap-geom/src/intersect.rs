//! Curve/curve intersection in the XY plane of a view.

use vcad_snap_math::{Point2, Point3, ViewMap};

use crate::curve::CurvePrimitive;

/// Minimum chords per curve when searching for crossings.
const SEARCH_CHORDS: usize = 32;

/// Parameter slack on segment ends, so crossings at shared vertices are found.
const PARAM_SLACK: f64 = 1e-10;

/// A crossing of two curves as seen in the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveIntersection {
    /// Fraction on the first curve.
    pub fraction_a: f64,
    /// Fraction on the second curve.
    pub fraction_b: f64,
    /// Point on the first curve.
    pub point_a: Point3,
    /// Point on the second curve.
    pub point_b: Point3,
    /// The curves coincide along an interval rather than crossing once.
    pub overlap: bool,
}

fn cross2(a: &nalgebra::Vector2<f64>, b: &nalgebra::Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn project(curve: &CurvePrimitive, view: &ViewMap, fraction: f64) -> Option<Point2> {
    let p = view.to_view(&curve.fraction_to_point(fraction)?)?;
    Some(Point2::new(p.x, p.y))
}

fn project_stroke(curve: &CurvePrimitive, view: &ViewMap) -> Option<Vec<(f64, Point2)>> {
    curve
        .stroke(SEARCH_CHORDS)
        .into_iter()
        .map(|(f, p)| {
            let v = view.to_view(&p)?;
            Some((f, Point2::new(v.x, v.y)))
        })
        .collect()
}

fn is_linear(curve: &CurvePrimitive) -> bool {
    matches!(curve, CurvePrimitive::Line(_) | CurvePrimitive::LineString(_))
}

/// Newton iteration on the projected difference, with a finite-difference
/// Jacobian.
fn refine(
    a: &CurvePrimitive,
    b: &CurvePrimitive,
    view: &ViewMap,
    mut fa: f64,
    mut fb: f64,
) -> Option<(f64, f64)> {
    const H: f64 = 1e-7;
    for _ in 0..16 {
        let pa = project(a, view, fa)?;
        let pb = project(b, view, fb)?;
        let r = pa - pb;
        if r.norm() < 1e-12 {
            break;
        }
        let ha = if fa + H <= 1.0 { H } else { -H };
        let hb = if fb + H <= 1.0 { H } else { -H };
        let da = (project(a, view, fa + ha)? - pa) / ha;
        let db = (project(b, view, fb + hb)? - pb) / hb;
        let det = cross2(&da, &(-db));
        if det.abs() < 1e-300 {
            return None;
        }
        // Solve [da, -db] * [dfa, dfb] = -r by Cramer's rule.
        let dfa = cross2(&(-r), &(-db)) / det;
        let dfb = cross2(&da, &(-r)) / det;
        fa = (fa + dfa).clamp(0.0, 1.0);
        fb = (fb + dfb).clamp(0.0, 1.0);
    }
    let gap = (project(a, view, fa)? - project(b, view, fb)?).norm();
    (gap < 1e-6).then_some((fa, fb))
}

/// All crossings of `a` and `b` after projection by `view`, ignoring view
/// depth. Collinear overlapping spans are reported once each with
/// `overlap` set.
pub fn intersect_xy(a: &CurvePrimitive, b: &CurvePrimitive, view: &ViewMap) -> Vec<CurveIntersection> {
    let (Some(sa), Some(sb)) = (project_stroke(a, view), project_stroke(b, view)) else {
        return Vec::new();
    };
    let exact = is_linear(a) && is_linear(b);
    let mut found: Vec<(f64, f64, bool)> = Vec::new();

    for wa in sa.windows(2) {
        let (fa0, a0) = wa[0];
        let (fa1, a1) = wa[1];
        let da = a1 - a0;
        for wb in sb.windows(2) {
            let (fb0, b0) = wb[0];
            let (fb1, b1) = wb[1];
            let db = b1 - b0;
            let denom = cross2(&da, &db);
            let scale = da.norm() * db.norm();
            if scale < 1e-300 {
                continue;
            }
            let w = b0 - a0;
            if denom.abs() <= 1e-12 * scale {
                // Parallel: only collinear spans that share length matter.
                if cross2(&da, &w).abs() > 1e-9 * da.norm() * da.norm().max(1.0) {
                    continue;
                }
                let dd = da.norm_squared();
                let t0 = w.dot(&da) / dd;
                let t1 = (b1 - a0).dot(&da) / dd;
                let (lo, hi) = (t0.min(t1).max(0.0), t0.max(t1).min(1.0));
                if hi - lo > PARAM_SLACK {
                    let fa = fa0 + lo * (fa1 - fa0);
                    let s = (a0 + da * lo - b0).dot(&db) / db.norm_squared();
                    found.push((fa, fb0 + s * (fb1 - fb0), true));
                }
                continue;
            }
            let s = cross2(&w, &db) / denom;
            let t = cross2(&w, &da) / denom;
            if !(-PARAM_SLACK..=1.0 + PARAM_SLACK).contains(&s)
                || !(-PARAM_SLACK..=1.0 + PARAM_SLACK).contains(&t)
            {
                continue;
            }
            let fa = fa0 + s.clamp(0.0, 1.0) * (fa1 - fa0);
            let fb = fb0 + t.clamp(0.0, 1.0) * (fb1 - fb0);
            if exact {
                found.push((fa, fb, false));
            } else if let Some((fa, fb)) = refine(a, b, view, fa, fb) {
                found.push((fa, fb, false));
            }
        }
    }

    let mut out: Vec<CurveIntersection> = Vec::new();
    for (fa, fb, overlap) in found {
        let duplicate = out.iter_mut().find(|x| {
            (x.fraction_a - fa).abs() < 1e-9 && (x.fraction_b - fb).abs() < 1e-9
        });
        if let Some(existing) = duplicate {
            existing.overlap |= overlap;
            continue;
        }
        let (Some(point_a), Some(point_b)) = (a.fraction_to_point(fa), b.fraction_to_point(fb)) else {
            continue;
        };
        out.push(CurveIntersection {
            fraction_a: fa,
            fraction_b: fb,
            point_a,
            point_b,
            overlap,
        });
    }
    out
}
