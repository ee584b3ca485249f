#![warn(missing_docs)]

//! B-rep shape model for the stepconv kernel.
//!
//! A [`Shape`] is what the STEP reader produces, the transform rebuilds, the
//! mesher annotates with per-face triangulations, and the STL writer consumes.
//! Geometry is kept exact (analytic curves and surfaces, B-splines) so the
//! mesher can choose its own discretization from deflection tolerances.

mod curve;
mod nurbs;
mod shape;
mod surface;
mod transform;

pub use curve::Curve;
pub use nurbs::{BSplineCurve, BSplineSurface, SplineError};
pub use shape::{Body, Edge, Face, Shape, Triangulation, Wire};
pub use surface::Surface;
pub use transform::{Similarity, TransformError};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = nalgebra::Vector3<f64>;

/// A unit direction in 3D space.
pub type Dir3 = nalgebra::Unit<nalgebra::Vector3<f64>>;

/// Geometric tolerance used for degeneracy checks (model units).
pub const EPSILON: f64 = 1e-9;

/// Build an orthonormal frame `(x, y, z)` from an axis and an optional
/// reference direction. The reference is projected onto the plane normal to
/// `axis`; when it is missing or parallel to the axis an arbitrary
/// perpendicular is picked.
pub fn frame(axis: Dir3, ref_dir: Option<Vec3>) -> (Dir3, Dir3, Dir3) {
    let z = axis.into_inner();
    let candidate = ref_dir
        .map(|r| r - r.dot(&z) * z)
        .filter(|r| r.norm() > EPSILON)
        .unwrap_or_else(|| {
            let arbitrary = if z.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
            arbitrary - arbitrary.dot(&z) * z
        });
    let x = Dir3::new_normalize(candidate);
    let y = Dir3::new_normalize(z.cross(&x.into_inner()));
    (x, y, axis)
}
