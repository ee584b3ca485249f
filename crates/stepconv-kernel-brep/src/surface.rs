//! Face geometry: planes, the analytic surfaces of revolution, and
//! B-spline surfaces.
//!
//! Surfaces of revolution share a parametrization: `u` is the angle around
//! `axis` measured from `x` towards `y`, `v` is either the height along the
//! axis (cylinder, cone) or a second angle (sphere latitude, torus tube).
//! With that convention `∂u × ∂v` points away from the material for a face
//! whose sense agrees with the surface. B-spline surfaces use their own knot
//! parametrization, with the same normal convention.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::{BSplineSurface, Dir3, Point3, Similarity, Vec3};

/// Underlying geometry of a face.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// Plane through `origin` with normal `normal`.
    Plane {
        /// A point on the plane.
        origin: Point3,
        /// In-plane reference direction.
        x: Dir3,
        /// In-plane direction `normal × x`.
        y: Dir3,
        /// Plane normal.
        normal: Dir3,
    },
    /// Circular cylinder of `radius` around `axis`.
    Cylinder {
        /// A point on the axis (height 0).
        origin: Point3,
        /// Reference direction (u = 0).
        x: Dir3,
        /// `axis × x`.
        y: Dir3,
        /// Cylinder axis.
        axis: Dir3,
        /// Radius.
        radius: f64,
    },
    /// Circular cone with radius `radius` at height 0 and half-angle
    /// `semi_angle` (radians).
    Cone {
        /// A point on the axis (height 0).
        origin: Point3,
        /// Reference direction (u = 0).
        x: Dir3,
        /// `axis × x`.
        y: Dir3,
        /// Cone axis.
        axis: Dir3,
        /// Radius at height 0.
        radius: f64,
        /// Half-angle at the apex, radians.
        semi_angle: f64,
    },
    /// Sphere of `radius` around `center`.
    Sphere {
        /// Center point.
        center: Point3,
        /// Reference direction (u = 0).
        x: Dir3,
        /// `axis × x`.
        y: Dir3,
        /// Polar axis.
        axis: Dir3,
        /// Radius.
        radius: f64,
    },
    /// Torus around `axis`.
    Torus {
        /// Center point.
        center: Point3,
        /// Reference direction (u = 0).
        x: Dir3,
        /// `axis × x`.
        y: Dir3,
        /// Axis of revolution.
        axis: Dir3,
        /// Distance from the axis to the tube center.
        major_radius: f64,
        /// Tube radius.
        minor_radius: f64,
    },
    /// Tensor-product B-spline surface, possibly rational.
    BSpline(Box<BSplineSurface>),
    /// A surface type the kernel does not model.
    Unsupported(String),
}

impl Surface {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Surface::Plane { .. } => "plane",
            Surface::Cylinder { .. } => "cylinder",
            Surface::Cone { .. } => "cone",
            Surface::Sphere { .. } => "sphere",
            Surface::Torus { .. } => "torus",
            Surface::BSpline(_) => "bspline",
            Surface::Unsupported(name) => name,
        }
    }

    /// Whether the surface is swept around an axis.
    pub fn is_revolution(&self) -> bool {
        self.revolution_frame().is_some()
    }

    /// Whether `v` is an angle (sphere, torus) rather than a height.
    pub fn v_is_angular(&self) -> bool {
        matches!(self, Surface::Sphere { .. } | Surface::Torus { .. })
    }

    /// Parameter range covering the whole surface in `v`, for surfaces that
    /// are bounded without trimming.
    pub fn natural_v_range(&self) -> Option<(f64, f64)> {
        match self {
            Surface::Sphere { .. } => Some((-FRAC_PI_2, FRAC_PI_2)),
            Surface::Torus { .. } => Some((0.0, TAU)),
            _ => None,
        }
    }

    /// Radius swept when `u` varies, at the widest point of `v_range`.
    pub fn u_radius(&self, v_range: (f64, f64)) -> Option<f64> {
        match self {
            Surface::Cylinder { radius, .. } | Surface::Sphere { radius, .. } => Some(*radius),
            Surface::Cone {
                radius, semi_angle, ..
            } => {
                let at = |v: f64| (radius + v * semi_angle.tan()).abs();
                Some(at(v_range.0).max(at(v_range.1)))
            }
            Surface::Torus {
                major_radius,
                minor_radius,
                ..
            } => Some(major_radius + minor_radius),
            _ => None,
        }
    }

    /// Radius swept when `v` varies; `None` when iso-`u` lines are straight.
    pub fn v_radius(&self) -> Option<f64> {
        match self {
            Surface::Sphere { radius, .. } => Some(*radius),
            Surface::Torus { minor_radius, .. } => Some(*minor_radius),
            _ => None,
        }
    }

    /// Point at `(u, v)`; `None` on a plane.
    pub fn evaluate(&self, u: f64, v: f64) -> Option<Point3> {
        let radial = |x: &Dir3, y: &Dir3| u.cos() * x.into_inner() + u.sin() * y.into_inner();
        match self {
            Surface::Cylinder {
                origin,
                x,
                y,
                axis,
                radius,
            } => Some(*origin + *radius * radial(x, y) + v * axis.into_inner()),
            Surface::Cone {
                origin,
                x,
                y,
                axis,
                radius,
                semi_angle,
            } => {
                let r = radius + v * semi_angle.tan();
                Some(*origin + r * radial(x, y) + v * axis.into_inner())
            }
            Surface::Sphere {
                center,
                x,
                y,
                axis,
                radius,
            } => Some(
                *center + radius * v.cos() * radial(x, y) + radius * v.sin() * axis.into_inner(),
            ),
            Surface::Torus {
                center,
                x,
                y,
                axis,
                major_radius,
                minor_radius,
            } => {
                let r = major_radius + minor_radius * v.cos();
                Some(*center + r * radial(x, y) + minor_radius * v.sin() * axis.into_inner())
            }
            Surface::BSpline(spline) => Some(spline.evaluate(u, v)),
            _ => None,
        }
    }

    /// Parameters `(u, v)` of the surface point nearest to `p`. On surfaces
    /// of revolution `u` lies in `(-π, π]`.
    pub fn project(&self, p: &Point3) -> Option<(f64, f64)> {
        if let Surface::BSpline(spline) = self {
            return Some(spline.project(p, None));
        }
        let (center, x, y, axis) = self.revolution_frame()?;
        let d = p - center;
        let h = d.dot(&axis);
        let radial = d - h * axis;
        let u = radial.dot(&y).atan2(radial.dot(&x));
        let v = match self {
            Surface::Cylinder { .. } | Surface::Cone { .. } => h,
            Surface::Sphere { .. } => h.atan2(radial.norm()),
            Surface::Torus { major_radius, .. } => h.atan2(radial.norm() - major_radius),
            _ => return None,
        };
        Some((u, v))
    }

    /// Distance of `p` from the axis of revolution; `u` is meaningless for
    /// points on the axis (sphere poles, cone apex).
    pub fn axis_distance(&self, p: &Point3) -> Option<f64> {
        let (center, _, _, axis) = self.revolution_frame()?;
        let d = p - center;
        Some((d - d.dot(&axis) * axis).norm())
    }

    /// Origin and in-plane frame of a plane.
    pub fn plane_frame(&self) -> Option<(Point3, Vec3, Vec3, Vec3)> {
        match self {
            Surface::Plane {
                origin,
                x,
                y,
                normal,
            } => Some((*origin, x.into_inner(), y.into_inner(), normal.into_inner())),
            _ => None,
        }
    }

    /// Map the surface through a similarity.
    pub fn transformed(&self, sim: &Similarity) -> Surface {
        match self {
            Surface::Plane {
                origin,
                x,
                y,
                normal,
            } => Surface::Plane {
                origin: sim.point(origin),
                x: sim.direction(x),
                y: sim.direction(y),
                normal: sim.direction(normal),
            },
            Surface::Cylinder {
                origin,
                x,
                y,
                axis,
                radius,
            } => Surface::Cylinder {
                origin: sim.point(origin),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                radius: sim.length(*radius),
            },
            Surface::Cone {
                origin,
                x,
                y,
                axis,
                radius,
                semi_angle,
            } => Surface::Cone {
                origin: sim.point(origin),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                radius: sim.length(*radius),
                semi_angle: *semi_angle,
            },
            Surface::Sphere {
                center,
                x,
                y,
                axis,
                radius,
            } => Surface::Sphere {
                center: sim.point(center),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                radius: sim.length(*radius),
            },
            Surface::Torus {
                center,
                x,
                y,
                axis,
                major_radius,
                minor_radius,
            } => Surface::Torus {
                center: sim.point(center),
                x: sim.direction(x),
                y: sim.direction(y),
                axis: sim.direction(axis),
                major_radius: sim.length(*major_radius),
                minor_radius: sim.length(*minor_radius),
            },
            Surface::BSpline(spline) => Surface::BSpline(Box::new(spline.transformed(sim))),
            Surface::Unsupported(name) => Surface::Unsupported(name.clone()),
        }
    }

    fn revolution_frame(&self) -> Option<(Point3, Vec3, Vec3, Vec3)> {
        match self {
            Surface::Cylinder {
                origin, x, y, axis, ..
            }
            | Surface::Cone {
                origin, x, y, axis, ..
            } => Some((*origin, x.into_inner(), y.into_inner(), axis.into_inner())),
            Surface::Sphere {
                center, x, y, axis, ..
            }
            | Surface::Torus {
                center, x, y, axis, ..
            } => Some((*center, x.into_inner(), y.into_inner(), axis.into_inner())),
            _ => None,
        }
    }
}
