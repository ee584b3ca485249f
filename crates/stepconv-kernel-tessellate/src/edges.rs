//! Boundary discretization.

use std::f64::consts::{PI, TAU};

use stepconv_kernel_brep::{BSplineCurve, Curve, Edge, Point3, Wire, EPSILON};

use crate::{MeshParams, MAX_SEGMENTS};

/// Number of chords for an arc of `radius` sweeping `sweep` radians.
///
/// The count satisfies both the angular limit and the chordal (sagitta)
/// limit; a full turn never gets fewer than three chords.
pub fn arc_segments(radius: f64, sweep: f64, params: &MeshParams) -> usize {
    let sweep = sweep.abs();
    if sweep <= EPSILON || radius <= EPSILON {
        return 1;
    }
    let extent = if sweep >= PI {
        2.0 * radius
    } else {
        2.0 * radius * (sweep / 2.0).sin()
    };
    let by_angle = (sweep / params.angular_deflection).ceil();
    let tolerance = params.chordal_tolerance(extent);
    let by_chord = if tolerance < radius {
        (sweep / (2.0 * (1.0 - tolerance / radius).acos())).ceil()
    } else {
        1.0
    };
    let floor = if sweep >= TAU - 1e-9 { 3.0 } else { 1.0 };
    (by_angle.max(by_chord).max(floor) as usize).min(MAX_SEGMENTS)
}

/// Chords needed over `[lo, hi]` of a smooth curve `at`, starting from
/// `start` and doubling until every chord meets both deflection limits.
pub(crate) fn curve_segments(
    at: impl Fn(f64) -> Point3,
    lo: f64,
    hi: f64,
    start: usize,
    params: &MeshParams,
) -> usize {
    let mut n = start.clamp(1, MAX_SEGMENTS);
    while n < MAX_SEGMENTS && !chords_fit(&at, lo, hi, n, params) {
        n = (n * 2).min(MAX_SEGMENTS);
    }
    n
}

fn chords_fit(at: &impl Fn(f64) -> Point3, lo: f64, hi: f64, n: usize, params: &MeshParams) -> bool {
    let step = (hi - lo) / n as f64;
    (0..n).all(|i| {
        let t = lo + step * i as f64;
        let (a, m, b) = (at(t), at(t + step / 2.0), at(t + step));
        let chord = b - a;
        let length = chord.norm();
        let sag = if length <= EPSILON {
            (m - a).norm()
        } else {
            (m - a).cross(&chord).norm() / length
        };
        let (first, second) = (m - a, b - m);
        let turn = if first.norm() <= EPSILON || second.norm() <= EPSILON {
            0.0
        } else {
            first.cross(&second).norm().atan2(first.dot(&second))
        };
        sag <= params.chordal_tolerance(length) && 2.0 * turn <= params.angular_deflection
    })
}

/// Parameters along the piece of `spline` from `t0` over `sweep`, excluding
/// the end. Every knot inside the piece is hit.
fn spline_parameters(spline: &BSplineCurve, t0: f64, sweep: f64, params: &MeshParams) -> Vec<f64> {
    let (lo, hi) = (t0.min(t0 + sweep), t0.max(t0 + sweep));
    let (d0, d1) = spline.domain();
    let shifts: &[f64] = if spline.is_closed() {
        &[d0 - d1, 0.0, d1 - d0]
    } else {
        &[0.0]
    };
    let mut cuts: Vec<f64> = spline
        .breaks()
        .iter()
        .flat_map(|b| shifts.iter().map(move |s| b + s))
        .filter(|&b| b > lo && b < hi)
        .chain([lo, hi])
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup_by(|a, b| (*a - *b).abs() <= (d1 - d0) * 1e-12);

    let mut ts = Vec::new();
    for w in cuts.windows(2) {
        let n = curve_segments(|t| spline.evaluate(t), w[0], w[1], spline.degree(), params);
        ts.extend((0..n).map(|i| w[0] + (w[1] - w[0]) * i as f64 / n as f64));
    }
    ts.push(hi);
    if sweep < 0.0 {
        ts.reverse();
    }
    ts.pop();
    ts
}

/// Points along an edge from `start`, excluding `end`.
fn sample_edge(edge: &Edge, params: &MeshParams) -> Vec<Point3> {
    let Some((t0, sweep)) = edge.curve.arc(&edge.start, &edge.end, edge.same_sense) else {
        return vec![edge.start];
    };
    let steps: Vec<f64> = match &edge.curve {
        Curve::BSpline(spline) => spline_parameters(spline, t0, sweep, params),
        curve => {
            let n = arc_segments(curve.extent_radius().unwrap_or(0.0), sweep, params);
            (0..n).map(|i| t0 + sweep * i as f64 / n as f64).collect()
        }
    };
    let mut points = Vec::with_capacity(steps.len().max(1));
    points.push(edge.start);
    points.extend(steps.iter().skip(1).filter_map(|&t| edge.curve.evaluate(t)));
    points
}

/// Closed polyline through a wire: each point once, the closing segment
/// implied. Coincident consecutive points are merged.
pub fn sample_wire(wire: &Wire, params: &MeshParams) -> Vec<Point3> {
    let mut points: Vec<Point3> = Vec::new();
    for edge in &wire.edges {
        for p in sample_edge(edge, params) {
            if points.last().map_or(true, |q| (p - q).norm() > EPSILON) {
                points.push(p);
            }
        }
    }
    while points.len() > 1 && (points[0] - points[points.len() - 1]).norm() <= EPSILON {
        points.pop();
    }
    points
}
