//! Edge geometry: lines, conics, and B-splines.

use std::f64::consts::TAU;

use crate::{BSplineCurve, Dir3, Point3, Similarity, EPSILON};

/// Underlying geometry of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    /// A straight segment between the edge's end points.
    Line,
    /// A circle in the plane spanned by `x` and `y`.
    Circle {
        /// Center point.
        center: Point3,
        /// Reference direction (parameter 0).
        x: Dir3,
        /// Second in-plane direction (`axis × x`).
        y: Dir3,
        /// Circle normal.
        axis: Dir3,
        /// Radius.
        radius: f64,
    },
    /// An ellipse with its major axis along `x`.
    Ellipse {
        /// Center point.
        center: Point3,
        /// Major axis direction.
        x: Dir3,
        /// Minor axis direction.
        y: Dir3,
        /// Ellipse normal.
        axis: Dir3,
        /// Semi-major axis length.
        semi_major: f64,
        /// Semi-minor axis length.
        semi_minor: f64,
    },
    /// A B-spline, possibly rational; the edge runs over part of it.
    BSpline(Box<BSplineCurve>),
    /// A curve type the kernel does not model; the edge is treated as a
    /// chord between its end points.
    Unsupported(String),
}

impl Curve {
    /// Whether the curve is a conic the mesher can subdivide.
    pub fn is_conic(&self) -> bool {
        matches!(self, Curve::Circle { .. } | Curve::Ellipse { .. })
    }

    /// Largest radius of curvature extent, used to size chordal deflection.
    pub fn extent_radius(&self) -> Option<f64> {
        match self {
            Curve::Circle { radius, .. } => Some(*radius),
            Curve::Ellipse { semi_major, .. } => Some(*semi_major),
            _ => None,
        }
    }

    /// Point at parameter `t` (radians on a conic).
    pub fn evaluate(&self, t: f64) -> Option<Point3> {
        if let Curve::BSpline(spline) = self {
            return Some(spline.evaluate(t));
        }
        let (center, x, y, a, b) = self.conic_parts()?;
        Some(center + a * t.cos() * x.into_inner() + b * t.sin() * y.into_inner())
    }

    /// Parameter of the curve point nearest to `p`; in `[0, 2π)` on a conic,
    /// measured by angle.
    pub fn parameter_of(&self, p: &Point3) -> Option<f64> {
        if let Curve::BSpline(spline) = self {
            return Some(spline.parameter_of(p));
        }
        let (center, x, y, a, b) = self.conic_parts()?;
        let d = p - center;
        let t = (d.dot(&y.into_inner()) / b).atan2(d.dot(&x.into_inner()) / a);
        Some(t.rem_euclid(TAU))
    }

    /// Start parameter and signed sweep of the arc running from `start` to
    /// `end`. A positive sweep follows the curve's parametric direction.
    /// Coincident end points denote a full revolution.
    pub fn arc(&self, start: &Point3, end: &Point3, same_sense: bool) -> Option<(f64, f64)> {
        if let Curve::BSpline(spline) = self {
            return Some(spline.arc(start, end, same_sense));
        }
        let t0 = self.parameter_of(start)?;
        let t1 = self.parameter_of(end)?;
        let closed = (start - end).norm() <= EPSILON.max(self.extent_radius()? * 1e-9);
        let forward = if closed { TAU } else { (t1 - t0).rem_euclid(TAU) };
        let sweep = if same_sense {
            forward
        } else if closed {
            -TAU
        } else {
            -(TAU - forward)
        };
        Some((t0, sweep))
    }

    /// Map the curve through a similarity.
    pub fn transformed(&self, sim: &Similarity) -> Curve {
        match self {
            Curve::Circle {
                center,
                x,
                y,
                axis,
                radius,
            } => Curve::Circle {
                center: sim.point(center),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                radius: sim.length(*radius),
            },
            Curve::Ellipse {
                center,
                x,
                y,
                axis,
                semi_major,
                semi_minor,
            } => Curve::Ellipse {
                center: sim.point(center),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                semi_major: sim.length(*semi_major),
                semi_minor: sim.length(*semi_minor),
            },
            Curve::BSpline(spline) => Curve::BSpline(Box::new(spline.transformed(sim))),
            other => other.clone(),
        }
    }

    fn conic_parts(&self) -> Option<(Point3, Dir3, Dir3, f64, f64)> {
        match self {
            Curve::Circle {
                center, x, y, radius, ..
            } => Some((*center, *x, *y, *radius, *radius)),
            Curve::Ellipse {
                center,
                x,
                y,
                semi_major,
                semi_minor,
                ..
            } => Some((*center, *x, *y, *semi_major, *semi_minor)),
            _ => None,
        }
    }
}
