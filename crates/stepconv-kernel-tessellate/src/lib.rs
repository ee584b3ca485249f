#![warn(missing_docs)]

//! B-rep to triangle mesh tessellation for the stepconv kernel.
//!
//! Every face of a [`Shape`] gets its own [`Triangulation`]:
//! 1. Boundary edges are discretized under a linear and an angular deflection
//! 2. Planar faces are ear-clipped in the plane, holes bridged into the outer loop
//! 3. Curved faces (revolution and B-spline) are trimmed in `(u, v)`, cut
//!    along a parameter grid, and mapped back to 3D
//!
//! A face on a surface the kernel does not model fails the whole shape, so a
//! mesh with holes is never written. Faces whose boundary collapses to
//! nothing are skipped with a warning.

mod edges;
mod parametric;
mod planar;

use log::{debug, warn};
use stepconv_kernel_brep::{Face, Shape, Surface, Triangulation};
use thiserror::Error;

pub use edges::{arc_segments, sample_wire};

/// Upper bound on the subdivisions of one arc or one parameter direction.
pub const MAX_SEGMENTS: usize = 2048;

/// Deflection limits that drive the mesh density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshParams {
    /// Maximum distance between a curve or surface and its chords.
    pub linear_deflection: f64,
    /// Maximum angle, in radians, between consecutive chords of a curve.
    pub angular_deflection: f64,
    /// Whether `linear_deflection` is a fraction of each arc's extent rather
    /// than an absolute length.
    pub relative: bool,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            linear_deflection: 0.5,
            angular_deflection: 0.5,
            relative: true,
        }
    }
}

impl MeshParams {
    /// Reject non-positive or non-finite deflections.
    pub fn validate(&self) -> Result<(), TessellateError> {
        for (name, value) in [
            ("linear", self.linear_deflection),
            ("angular", self.angular_deflection),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TessellateError::InvalidDeflection { name, value });
            }
        }
        Ok(())
    }

    /// Chordal tolerance for an arc whose extent (chord or diameter) is
    /// `extent`.
    pub fn chordal_tolerance(&self, extent: f64) -> f64 {
        if self.relative {
            self.linear_deflection * extent
        } else {
            self.linear_deflection
        }
    }
}

/// Errors from meshing a shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TessellateError {
    /// A deflection parameter is zero, negative, or not finite.
    #[error("{name} deflection must be positive, got {value}")]
    InvalidDeflection {
        /// Which parameter.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A face lies on a surface the kernel cannot evaluate.
    #[error("cannot mesh a face on {kind}")]
    UnsupportedSurface {
        /// Surface type as named in the source file.
        kind: String,
    },
    /// A curved face has no boundary and its surface does not close.
    #[error("{kind} face has no boundary")]
    Unbounded {
        /// Surface type.
        kind: String,
    },
    /// None of the shape's faces could be triangulated.
    #[error("no face could be meshed ({faces} faces)")]
    NothingMeshed {
        /// Number of faces in the shape.
        faces: usize,
    },
}

/// Outcome of meshing a shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Faces that received a triangulation.
    pub faces_meshed: usize,
    /// Faces left without one.
    pub faces_skipped: usize,
    /// Triangles over all faces.
    pub triangles: usize,
}

/// Mesh every face of `shape` in place, replacing earlier triangulations.
///
/// Degenerate faces are skipped. The call fails when the parameters are
/// invalid, a face cannot be meshed at all, or no face produced triangles.
pub fn tessellate_shape(
    shape: &mut Shape,
    params: &MeshParams,
) -> Result<MeshStats, TessellateError> {
    params.validate()?;
    let mut stats = MeshStats::default();
    for face in shape.faces_mut() {
        face.triangulation = tessellate_face(face, params)?.filter(|t| t.num_triangles() > 0);
        match &face.triangulation {
            Some(t) => {
                stats.faces_meshed += 1;
                stats.triangles += t.num_triangles();
            }
            None => {
                warn!("skipping {} face: nothing to triangulate", face.surface.kind());
                stats.faces_skipped += 1;
            }
        }
    }
    if stats.faces_meshed == 0 {
        return Err(TessellateError::NothingMeshed {
            faces: shape.face_count(),
        });
    }
    debug!(
        "meshed {} faces into {} triangles ({} skipped)",
        stats.faces_meshed, stats.triangles, stats.faces_skipped
    );
    Ok(stats)
}

/// Triangulate one face, oriented along the face normal. `Ok(None)` when the
/// boundary is degenerate.
pub fn tessellate_face(
    face: &Face,
    params: &MeshParams,
) -> Result<Option<Triangulation>, TessellateError> {
    let mesh = match &face.surface {
        Surface::Plane { .. } => planar::tessellate_planar_face(face, params),
        Surface::Unsupported(kind) => {
            return Err(TessellateError::UnsupportedSurface { kind: kind.clone() })
        }
        surface if !parametric::is_bounded(face) => {
            return Err(TessellateError::Unbounded {
                kind: surface.kind().to_string(),
            })
        }
        _ => parametric::tessellate_parametric_face(face, params),
    };
    Ok(mesh.map(|mut mesh| {
        if !face.same_sense {
            for tri in &mut mesh.triangles {
                tri.swap(1, 2);
            }
        }
        mesh
    }))
}

#[cfg(test)]
pub(crate) mod test_shapes {
    use stepconv_kernel_brep::{Body, Curve, Dir3, Edge, Face, Point3, Surface, Vec3, Wire};

    pub fn dir(x: f64, y: f64, z: f64) -> Dir3 {
        Dir3::new_normalize(Vec3::new(x, y, z))
    }

    pub fn plane(origin: Point3, normal: Dir3) -> Surface {
        let (x, y, normal) = stepconv_kernel_brep::frame(normal, None);
        Surface::Plane {
            origin,
            x,
            y,
            normal,
        }
    }

    /// Axis-aligned box with outward-facing planar faces.
    pub fn cuboid(a: f64, b: f64, c: f64) -> Body {
        let p = |x: f64, y: f64, z: f64| Point3::new(x * a, y * b, z * c);
        let quads = [
            ([p(0., 0., 0.), p(0., 1., 0.), p(1., 1., 0.), p(1., 0., 0.)], dir(0., 0., -1.)),
            ([p(0., 0., 1.), p(1., 0., 1.), p(1., 1., 1.), p(0., 1., 1.)], dir(0., 0., 1.)),
            ([p(0., 0., 0.), p(1., 0., 0.), p(1., 0., 1.), p(0., 0., 1.)], dir(0., -1., 0.)),
            ([p(0., 1., 0.), p(0., 1., 1.), p(1., 1., 1.), p(1., 1., 0.)], dir(0., 1., 0.)),
            ([p(0., 0., 0.), p(0., 0., 1.), p(0., 1., 1.), p(0., 1., 0.)], dir(-1., 0., 0.)),
            ([p(1., 0., 0.), p(1., 1., 0.), p(1., 1., 1.), p(1., 0., 1.)], dir(1., 0., 0.)),
        ];
        let faces = quads
            .iter()
            .map(|(pts, n)| Face::new(plane(pts[0], *n), vec![Wire::polygon(pts)], Some(0), true))
            .collect();
        Body {
            name: "cuboid".into(),
            faces,
            closed: true,
        }
    }

    fn circle(center: Point3, radius: f64) -> Curve {
        Curve::Circle {
            center,
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius,
        }
    }

    /// Cylinder around +Z: seamed side face plus two caps.
    pub fn cylinder(r: f64, h: f64) -> Body {
        let (b, t) = (Point3::new(r, 0., 0.), Point3::new(r, 0., h));
        let bottom = Edge {
            start: b,
            end: b,
            curve: circle(Point3::origin(), r),
            same_sense: true,
        };
        let top = Edge {
            start: t,
            end: t,
            curve: circle(Point3::new(0., 0., h), r),
            same_sense: false,
        };
        let side = Wire {
            edges: vec![bottom.clone(), Edge::line(b, t), top.clone(), Edge::line(t, b)],
        };
        let (x, y, axis) = (dir(1., 0., 0.), dir(0., 1., 0.), dir(0., 0., 1.));
        let faces = vec![
            Face::new(
                Surface::Cylinder {
                    origin: Point3::origin(),
                    x,
                    y,
                    axis,
                    radius: r,
                },
                vec![side],
                Some(0),
                true,
            ),
            Face::new(
                plane(Point3::new(0., 0., h), axis),
                vec![Wire {
                    edges: vec![Edge {
                        same_sense: true,
                        ..top
                    }],
                }],
                Some(0),
                true,
            ),
            Face::new(
                plane(Point3::origin(), dir(0., 0., -1.)),
                vec![Wire {
                    edges: vec![Edge {
                        same_sense: false,
                        ..bottom
                    }],
                }],
                Some(0),
                true,
            ),
        ];
        Body {
            name: "cylinder".into(),
            faces,
            closed: true,
        }
    }

    /// Unbounded sphere or torus face (the whole surface).
    pub fn closed_surface(surface: Surface) -> Body {
        Body {
            name: surface.kind().to_string(),
            faces: vec![Face::new(surface, Vec::new(), None, true)],
            closed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::test_shapes::*;
    use super::*;
    use stepconv_kernel_brep::{Point3, Wire};

    fn fine() -> MeshParams {
        MeshParams {
            linear_deflection: 0.001,
            angular_deflection: 0.05,
            relative: false,
        }
    }

    #[test]
    fn test_cuboid_volume_and_area() {
        let mut shape = Shape::new("box", vec![cuboid(10.0, 10.0, 10.0)]);
        let stats = tessellate_shape(&mut shape, &MeshParams::default()).unwrap();
        assert_eq!(stats.faces_meshed, 6);
        assert_eq!(stats.triangles, 12);
        let mesh = shape.combined_triangulation();
        assert!((mesh.signed_volume() - 1000.0).abs() < 1e-9);
        assert!((mesh.area() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_volume() {
        let mut shape = Shape::new("pin", vec![cylinder(5.0, 10.0)]);
        tessellate_shape(&mut shape, &fine()).unwrap();
        let expected = PI * 25.0 * 10.0;
        let vol = shape.combined_triangulation().signed_volume();
        assert!((vol - expected).abs() < expected * 0.01, "expected ~{expected}, got {vol}");
    }

    #[test]
    fn test_default_params_give_coarse_but_closed_cylinder() {
        let mut shape = Shape::new("pin", vec![cylinder(5.0, 10.0)]);
        let stats = tessellate_shape(&mut shape, &MeshParams::default()).unwrap();
        assert_eq!(stats.faces_meshed, 3);
        let expected = PI * 25.0 * 10.0;
        let vol = shape.combined_triangulation().signed_volume();
        assert!(vol > 0.0 && (vol - expected).abs() < expected * 0.05, "got {vol}");
    }

    #[test]
    fn test_sphere_and_torus_volume() {
        let (x, y, axis) = (dir(1., 0., 0.), dir(0., 1., 0.), dir(0., 0., 1.));
        let mut sphere = Shape::new(
            "ball",
            vec![closed_surface(Surface::Sphere {
                center: Point3::new(1.0, 2.0, 3.0),
                x,
                y,
                axis,
                radius: 10.0,
            })],
        );
        tessellate_shape(&mut sphere, &fine()).unwrap();
        let expected = 4.0 / 3.0 * PI * 1000.0;
        let vol = sphere.combined_triangulation().signed_volume();
        assert!((vol - expected).abs() < expected * 0.01, "expected ~{expected}, got {vol}");

        let mut torus = Shape::new(
            "ring",
            vec![closed_surface(Surface::Torus {
                center: Point3::origin(),
                x,
                y,
                axis,
                major_radius: 10.0,
                minor_radius: 2.0,
            })],
        );
        tessellate_shape(&mut torus, &fine()).unwrap();
        let expected = 2.0 * PI * PI * 10.0 * 4.0;
        let vol = torus.combined_triangulation().signed_volume();
        assert!((vol - expected).abs() < expected * 0.01, "expected ~{expected}, got {vol}");
    }

    #[test]
    fn test_reversed_faces_flip_orientation() {
        let mut body = cuboid(2.0, 2.0, 2.0);
        for face in &mut body.faces {
            face.same_sense = false;
        }
        let mut shape = Shape::new("inside-out", vec![body]);
        tessellate_shape(&mut shape, &MeshParams::default()).unwrap();
        assert!((shape.combined_triangulation().signed_volume() + 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_face_fails_the_shape() {
        let mut body = cuboid(1.0, 1.0, 1.0);
        body.faces[3].surface = Surface::Unsupported("OFFSET_SURFACE".into());
        let mut shape = Shape::new("partial", vec![body]);
        assert_eq!(
            tessellate_shape(&mut shape, &MeshParams::default()),
            Err(TessellateError::UnsupportedSurface {
                kind: "OFFSET_SURFACE".into()
            })
        );
    }

    #[test]
    fn test_unbounded_cylinder_is_an_error() {
        let mut body = cylinder(1.0, 2.0);
        body.faces[0].wires.clear();
        let mut shape = Shape::new("open", vec![body]);
        assert_eq!(
            tessellate_shape(&mut shape, &MeshParams::default()),
            Err(TessellateError::Unbounded {
                kind: "cylinder".into()
            })
        );
    }

    #[test]
    fn test_degenerate_faces_are_skipped() {
        let mut body = cuboid(1.0, 1.0, 1.0);
        let corner = Point3::origin();
        body.faces[0].wires = vec![Wire::polygon(&[corner, corner, corner])];
        let mut shape = Shape::new("dented", vec![body.clone()]);
        let stats = tessellate_shape(&mut shape, &MeshParams::default()).unwrap();
        assert_eq!((stats.faces_meshed, stats.faces_skipped), (5, 1));
        assert!(shape.bodies[0].faces[0].triangulation.is_none());

        for face in &mut body.faces {
            face.wires = vec![Wire::polygon(&[corner, corner, corner])];
        }
        let mut shape = Shape::new("flat", vec![body]);
        assert_eq!(
            tessellate_shape(&mut shape, &MeshParams::default()),
            Err(TessellateError::NothingMeshed { faces: 6 })
        );
    }

    #[test]
    fn test_remeshing_replaces_triangulation() {
        let mut shape = Shape::new("pin", vec![cylinder(5.0, 10.0)]);
        tessellate_shape(&mut shape, &fine()).unwrap();
        let fine_count = shape.triangle_count();
        let stats = tessellate_shape(&mut shape, &MeshParams::default()).unwrap();
        assert_eq!(shape.triangle_count(), stats.triangles);
        assert!(stats.triangles < fine_count);
    }

    #[test]
    fn test_invalid_params() {
        let mut shape = Shape::new("box", vec![cuboid(1.0, 1.0, 1.0)]);
        let params = MeshParams {
            linear_deflection: 0.0,
            ..MeshParams::default()
        };
        assert!(matches!(
            tessellate_shape(&mut shape, &params),
            Err(TessellateError::InvalidDeflection { name: "linear", .. })
        ));
        let params = MeshParams {
            angular_deflection: f64::NAN,
            ..MeshParams::default()
        };
        assert!(params.validate().is_err());
    }
}
