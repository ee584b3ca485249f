//! B-spline curves and tensor-product B-spline surfaces, optionally rational.
//!
//! Both are evaluated with the Cox-de Boor recurrence over their non-zero
//! basis functions. Rational variants carry one weight per control point and
//! are evaluated in homogeneous coordinates, so a similarity maps them by
//! mapping the control points alone.

use thiserror::Error;

use crate::{Point3, Similarity, Vec3, EPSILON};

/// Reasons a control net and knot vector do not describe a B-spline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    /// Degree zero.
    #[error("degree must be at least 1")]
    Degree,
    /// Knot vector length does not match `points + degree + 1`.
    #[error("{direction} knot vector has {found} entries, expected {expected}")]
    KnotCount {
        /// `"u"`, `"v"`, or `"curve"`.
        direction: &'static str,
        /// Knots supplied.
        found: usize,
        /// Knots required.
        expected: usize,
    },
    /// Knots decrease, are not finite, or leave an empty domain.
    #[error("{0} knot vector must be finite and non-decreasing over a non-empty domain")]
    KnotOrder(&'static str),
    /// Control point count does not match the net dimensions.
    #[error("control net has {found} points, expected {expected}")]
    ControlCount {
        /// Points supplied.
        found: usize,
        /// Points required.
        expected: usize,
    },
    /// A weight is not positive, or the count is wrong.
    #[error("weights must be positive, one per control point")]
    Weights,
}

fn check_knots(
    knots: &[f64],
    n_points: usize,
    degree: usize,
    direction: &'static str,
) -> Result<(), SplineError> {
    if degree == 0 {
        return Err(SplineError::Degree);
    }
    let expected = n_points + degree + 1;
    if knots.len() != expected {
        return Err(SplineError::KnotCount {
            direction,
            found: knots.len(),
            expected,
        });
    }
    let ordered = knots.iter().all(|k| k.is_finite()) && knots.windows(2).all(|w| w[0] <= w[1]);
    if !ordered || knots[degree] >= knots[n_points] {
        return Err(SplineError::KnotOrder(direction));
    }
    Ok(())
}

fn check_weights(weights: &[f64], n_points: usize) -> Result<(), SplineError> {
    if weights.len() != n_points || !weights.iter().all(|w| w.is_finite() && *w > 0.0) {
        return Err(SplineError::Weights);
    }
    Ok(())
}

/// Knot span index `i` with `knots[i] <= t < knots[i + 1]`; `n` is the last
/// control point index. The end of the domain maps to the last span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let (mut low, mut high) = (degree, n + 1);
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

/// The `degree + 1` basis functions that are non-zero on `span`.
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
            let temp = if denom.abs() < 1e-300 { 0.0 } else { n[r] / denom };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Distinct knot values inside the domain, ends included.
fn breaks(knots: &[f64], degree: usize, n_points: usize) -> Vec<f64> {
    let mut out: Vec<f64> = knots[degree..=n_points].to_vec();
    out.dedup();
    out
}

/// Weighted average of control points, divided through by the weight sum.
fn blend<'a>(terms: impl Iterator<Item = (f64, &'a Point3, f64)>) -> Point3 {
    let (mut acc, mut total) = (Vec3::zeros(), 0.0);
    for (basis, p, w) in terms {
        acc += basis * w * p.coords;
        total += basis * w;
    }
    if total.abs() > 1e-300 {
        Point3::from(acc / total)
    } else {
        Point3::from(acc)
    }
}

fn diagonal(points: &[Point3]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (lo, hi) = points
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    (hi - lo).norm()
}

/// A B-spline curve.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point3>,
    weights: Option<Vec<f64>>,
    closed: bool,
}

impl BSplineCurve {
    /// A non-rational curve from its expanded knot vector.
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point3>,
    ) -> Result<Self, SplineError> {
        check_knots(&knots, control_points.len(), degree, "curve")?;
        Ok(Self {
            degree,
            knots,
            control_points,
            weights: None,
            closed: false,
        }
        .with_closure())
    }

    /// Make the curve rational.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, SplineError> {
        check_weights(&weights, self.control_points.len())?;
        self.weights = Some(weights);
        Ok(self.with_closure())
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Control points in order.
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    /// Number of non-empty knot spans in the domain.
    pub fn span_count(&self) -> usize {
        self.breaks().len() - 1
    }

    /// Distinct knots inside the domain, ends included.
    pub fn breaks(&self) -> Vec<f64> {
        breaks(&self.knots, self.degree, self.control_points.len())
    }

    /// Parameter domain.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    /// Whether the curve ends where it starts.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Point at `t`. Closed curves are periodic; open ones clamp to the domain.
    pub fn evaluate(&self, t: f64) -> Point3 {
        let (lo, hi) = self.domain();
        if self.closed && !(lo..=hi).contains(&t) {
            return self.point_at(lo + (t - lo).rem_euclid(hi - lo));
        }
        self.point_at(t.clamp(lo, hi))
    }

    fn point_at(&self, t: f64) -> Point3 {
        let n = self.control_points.len() - 1;
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);
        let first = span - self.degree;
        blend(basis.iter().enumerate().map(|(i, &b)| {
            let k = first + i;
            (b, &self.control_points[k], self.weight(k))
        }))
    }

    /// Parameter of the curve point nearest to `p`.
    pub fn parameter_of(&self, p: &Point3) -> f64 {
        let (lo, hi) = self.domain();
        let samples = (self.control_points.len() * 4).clamp(16, 256);
        let mut best = (f64::INFINITY, lo);
        for i in 0..=samples {
            let t = lo + (hi - lo) * i as f64 / samples as f64;
            let d = (self.evaluate(t) - p).norm_squared();
            if d < best.0 {
                best = (d, t);
            }
        }
        let h = (hi - lo) * 1e-6;
        let mut t = best.1;
        for _ in 0..32 {
            let tangent = (self.evaluate((t + h).min(hi)) - self.evaluate((t - h).max(lo)))
                / ((t + h).min(hi) - (t - h).max(lo));
            let speed = tangent.norm_squared();
            if speed < 1e-300 {
                break;
            }
            let next = (t + (p - self.evaluate(t)).dot(&tangent) / speed).clamp(lo, hi);
            let done = (next - t).abs() <= (hi - lo) * 1e-12;
            t = next;
            if done {
                break;
            }
        }
        t
    }

    /// Start parameter and signed parameter sweep of the piece running from
    /// `start` to `end`. Coincident end points denote the whole curve.
    pub fn arc(&self, start: &Point3, end: &Point3, same_sense: bool) -> (f64, f64) {
        let (lo, hi) = self.domain();
        let span = hi - lo;
        if (start - end).norm() <= self.tolerance() {
            return if same_sense { (lo, span) } else { (hi, -span) };
        }
        let (mut t0, mut t1) = (self.parameter_of(start), self.parameter_of(end));
        if self.closed {
            let at = |t: f64, x: f64| (t - x).abs() <= span * 1e-9;
            if same_sense {
                if at(t0, hi) {
                    t0 = lo;
                }
                if at(t1, lo) {
                    t1 = hi;
                }
            } else {
                if at(t0, lo) {
                    t0 = hi;
                }
                if at(t1, hi) {
                    t1 = lo;
                }
            }
        }
        let mut sweep = t1 - t0;
        if self.closed {
            if same_sense && sweep < 0.0 {
                sweep += span;
            } else if !same_sense && sweep > 0.0 {
                sweep -= span;
            }
        }
        (t0, sweep)
    }

    /// Map the curve through a similarity.
    pub fn transformed(&self, sim: &Similarity) -> Self {
        Self {
            control_points: self.control_points.iter().map(|p| sim.point(p)).collect(),
            ..self.clone()
        }
    }

    fn with_closure(mut self) -> Self {
        let (lo, hi) = self.domain();
        self.closed = (self.point_at(lo) - self.point_at(hi)).norm() <= self.tolerance();
        self
    }

    fn tolerance(&self) -> f64 {
        EPSILON.max(diagonal(&self.control_points) * 1e-9)
    }

    fn weight(&self, k: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[k])
    }
}

/// A tensor-product B-spline surface.
///
/// Control points are stored row-major by `v`: `points[j * n_u + i]` is the
/// point with `u` index `i` and `v` index `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurface {
    degree_u: usize,
    degree_v: usize,
    n_u: usize,
    n_v: usize,
    knots_u: Vec<f64>,
    knots_v: Vec<f64>,
    control_points: Vec<Point3>,
    weights: Option<Vec<f64>>,
}

impl BSplineSurface {
    /// A non-rational surface from expanded knot vectors.
    pub fn new(
        (degree_u, degree_v): (usize, usize),
        (n_u, n_v): (usize, usize),
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        control_points: Vec<Point3>,
    ) -> Result<Self, SplineError> {
        if control_points.len() != n_u * n_v {
            return Err(SplineError::ControlCount {
                found: control_points.len(),
                expected: n_u * n_v,
            });
        }
        check_knots(&knots_u, n_u, degree_u, "u")?;
        check_knots(&knots_v, n_v, degree_v, "v")?;
        Ok(Self {
            degree_u,
            degree_v,
            n_u,
            n_v,
            knots_u,
            knots_v,
            control_points,
            weights: None,
        })
    }

    /// Make the surface rational; weights use the control point layout.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, SplineError> {
        check_weights(&weights, self.control_points.len())?;
        self.weights = Some(weights);
        Ok(self)
    }

    /// Degrees in `u` and `v`.
    pub fn degrees(&self) -> (usize, usize) {
        (self.degree_u, self.degree_v)
    }

    /// Control net dimensions in `u` and `v`.
    pub fn net_size(&self) -> (usize, usize) {
        (self.n_u, self.n_v)
    }

    /// Whether the surface carries weights.
    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Parameter domain in `u` and `v`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree_u], self.knots_u[self.n_u]),
            (self.knots_v[self.degree_v], self.knots_v[self.n_v]),
        )
    }

    /// Distinct `u` knots inside the domain.
    pub fn breaks_u(&self) -> Vec<f64> {
        breaks(&self.knots_u, self.degree_u, self.n_u)
    }

    /// Distinct `v` knots inside the domain.
    pub fn breaks_v(&self) -> Vec<f64> {
        breaks(&self.knots_v, self.degree_v, self.n_v)
    }

    /// Diagonal of the control net's bounding box.
    pub fn extent(&self) -> f64 {
        diagonal(&self.control_points)
    }

    /// Point at `(u, v)`, clamped to the domain.
    pub fn evaluate(&self, u: f64, v: f64) -> Point3 {
        let ((u0, u1), (v0, v1)) = self.domain();
        let (u, v) = (u.clamp(u0, u1), v.clamp(v0, v1));
        let span_u = find_span(&self.knots_u, self.n_u - 1, self.degree_u, u);
        let span_v = find_span(&self.knots_v, self.n_v - 1, self.degree_v, v);
        let basis_u = basis_functions(&self.knots_u, span_u, self.degree_u, u);
        let basis_v = basis_functions(&self.knots_v, span_v, self.degree_v, v);
        let (first_u, first_v) = (span_u - self.degree_u, span_v - self.degree_v);
        blend(basis_v.iter().enumerate().flat_map(|(j, &bv)| {
            basis_u.iter().enumerate().map(move |(i, &bu)| {
                let k = (first_v + j) * self.n_u + first_u + i;
                (bu * bv, &self.control_points[k], self.weight(k))
            })
        }))
    }

    /// Partial derivatives `(∂u, ∂v)` by central differences.
    pub fn derivatives(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let ((u0, u1), (v0, v1)) = self.domain();
        let (hu, hv) = ((u1 - u0) * 1e-6, (v1 - v0) * 1e-6);
        let (ua, ub) = ((u - hu).max(u0), (u + hu).min(u1));
        let (va, vb) = ((v - hv).max(v0), (v + hv).min(v1));
        (
            (self.evaluate(ub, v) - self.evaluate(ua, v)) / (ub - ua),
            (self.evaluate(u, vb) - self.evaluate(u, va)) / (vb - va),
        )
    }

    /// Parameters of the surface point nearest to `p`, refined from `hint`
    /// when given and from a coarse parameter grid otherwise.
    pub fn project(&self, p: &Point3, hint: Option<(f64, f64)>) -> (f64, f64) {
        if let Some(start) = hint {
            let uv = self.refine(p, start);
            let tolerance = EPSILON.max(self.extent() * 1e-6);
            if (self.evaluate(uv.0, uv.1) - p).norm() <= tolerance {
                return uv;
            }
        }
        let start = self.nearest_sample(p);
        self.refine(p, start)
    }

    /// Map the surface through a similarity.
    pub fn transformed(&self, sim: &Similarity) -> Self {
        Self {
            control_points: self.control_points.iter().map(|p| sim.point(p)).collect(),
            ..self.clone()
        }
    }

    fn nearest_sample(&self, p: &Point3) -> (f64, f64) {
        let ((u0, u1), (v0, v1)) = self.domain();
        let nu = (self.n_u * 3).clamp(8, 64);
        let nv = (self.n_v * 3).clamp(8, 64);
        let mut best = (f64::INFINITY, (u0, v0));
        for j in 0..=nv {
            let v = v0 + (v1 - v0) * j as f64 / nv as f64;
            for i in 0..=nu {
                let u = u0 + (u1 - u0) * i as f64 / nu as f64;
                let d = (self.evaluate(u, v) - p).norm_squared();
                if d < best.0 {
                    best = (d, (u, v));
                }
            }
        }
        best.1
    }

    /// Gauss-Newton on the squared distance, clamped to the domain.
    fn refine(&self, p: &Point3, (mut u, mut v): (f64, f64)) -> (f64, f64) {
        let ((u0, u1), (v0, v1)) = self.domain();
        for _ in 0..32 {
            let r = p - self.evaluate(u, v);
            let (su, sv) = self.derivatives(u, v);
            let (a, b, c) = (su.dot(&su), su.dot(&sv), sv.dot(&sv));
            let det = a * c - b * b;
            if det.abs() < 1e-300 {
                break;
            }
            let (ru, rv) = (su.dot(&r), sv.dot(&r));
            let next_u = (u + (c * ru - b * rv) / det).clamp(u0, u1);
            let next_v = (v + (a * rv - b * ru) / det).clamp(v0, v1);
            let done = (next_u - u).abs() <= (u1 - u0) * 1e-12
                && (next_v - v).abs() <= (v1 - v0) * 1e-12;
            (u, v) = (next_u, next_v);
            if done {
                break;
            }
        }
        (u, v)
    }

    fn weight(&self, k: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[k])
    }
}
