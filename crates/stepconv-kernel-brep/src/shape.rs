//! Topology: edges, wires, faces, bodies, and the shape handle.

use crate::{Curve, Point3, Similarity, Surface, TransformError};

/// An edge oriented along the wire that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// First point in wire order.
    pub start: Point3,
    /// Last point in wire order.
    pub end: Point3,
    /// Underlying geometry.
    pub curve: Curve,
    /// Whether walking `start → end` follows the curve's parametric direction.
    pub same_sense: bool,
}

impl Edge {
    /// A straight edge.
    pub fn line(start: Point3, end: Point3) -> Self {
        Self {
            start,
            end,
            curve: Curve::Line,
            same_sense: true,
        }
    }

    fn transformed(&self, sim: &Similarity) -> Edge {
        Edge {
            start: sim.point(&self.start),
            end: sim.point(&self.end),
            curve: self.curve.transformed(sim),
            same_sense: self.same_sense,
        }
    }
}

/// A closed chain of edges bounding a face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wire {
    /// Edges in traversal order; each edge's `end` meets the next `start`.
    pub edges: Vec<Edge>,
}

impl Wire {
    /// A closed polygon through `points` (the closing edge is implied).
    pub fn polygon(points: &[Point3]) -> Self {
        let n = points.len();
        let edges = (0..n)
            .map(|i| Edge::line(points[i], points[(i + 1) % n]))
            .collect();
        Self { edges }
    }

    /// Whether the wire has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Triangle mesh attached to a face by the mesher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    /// Mesh nodes.
    pub nodes: Vec<Point3>,
    /// Counter-clockwise (outward-facing) triangles indexing `nodes`.
    pub triangles: Vec<[u32; 3]>,
}

impl Triangulation {
    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Append another triangulation, re-indexing its triangles.
    pub fn merge(&mut self, other: &Triangulation) {
        let offset = self.nodes.len() as u32;
        self.nodes.extend_from_slice(&other.nodes);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    /// Iterate over triangle corner positions.
    pub fn corners(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        self.triangles.iter().map(move |t| {
            [
                self.nodes[t[0] as usize],
                self.nodes[t[1] as usize],
                self.nodes[t[2] as usize],
            ]
        })
    }

    /// Total triangle area.
    pub fn area(&self) -> f64 {
        self.corners()
            .map(|[a, b, c]| (b - a).cross(&(c - a)).norm() / 2.0)
            .sum()
    }

    /// Enclosed volume by the divergence theorem (meaningful for closed meshes).
    pub fn signed_volume(&self) -> f64 {
        self.corners()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }
}

/// A bounded portion of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Underlying surface.
    pub surface: Surface,
    /// Boundary wires.
    pub wires: Vec<Wire>,
    /// Index into `wires` of the outer boundary when the file marked one.
    pub outer: Option<usize>,
    /// Whether the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Mesh produced by the mesher, if any.
    pub triangulation: Option<Triangulation>,
}

impl Face {
    /// A face with no triangulation yet.
    pub fn new(surface: Surface, wires: Vec<Wire>, outer: Option<usize>, same_sense: bool) -> Self {
        Self {
            surface,
            wires,
            outer,
            same_sense,
            triangulation: None,
        }
    }
}

/// A solid or shell: a named set of faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Name carried by the source entity (may be empty).
    pub name: String,
    /// Faces of every shell of the body.
    pub faces: Vec<Face>,
    /// Whether the faces form a closed shell.
    pub closed: bool,
}

impl Body {
    /// A copy mapped through `sim`, without triangulations.
    pub fn transformed(&self, sim: &Similarity) -> Body {
        Body {
            name: self.name.clone(),
            closed: self.closed,
            faces: self
                .faces
                .iter()
                .map(|face| Face {
                    surface: face.surface.transformed(sim),
                    wires: face
                        .wires
                        .iter()
                        .map(|w| Wire {
                            edges: w.edges.iter().map(|e| e.transformed(sim)).collect(),
                        })
                        .collect(),
                    outer: face.outer,
                    same_sense: face.same_sense,
                    triangulation: None,
                })
                .collect(),
        }
    }
}

/// The in-memory shape handle passed through read, scale, mesh, and write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    /// Name used for the STL `solid` record.
    pub name: String,
    /// Bodies in file order.
    pub bodies: Vec<Body>,
}

impl Shape {
    /// Create a shape from bodies.
    pub fn new(name: impl Into<String>, bodies: Vec<Body>) -> Self {
        Self {
            name: name.into(),
            bodies,
        }
    }

    /// Iterate over every face.
    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.bodies.iter().flat_map(|b| b.faces.iter())
    }

    /// Iterate mutably over every face.
    pub fn faces_mut(&mut self) -> impl Iterator<Item = &mut Face> {
        self.bodies.iter_mut().flat_map(|b| b.faces.iter_mut())
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        self.bodies.iter().map(|b| b.faces.len()).sum()
    }

    /// Whether any face carries a triangulation.
    pub fn is_meshed(&self) -> bool {
        self.faces().any(|f| f.triangulation.is_some())
    }

    /// Number of triangles over all faces.
    pub fn triangle_count(&self) -> usize {
        self.faces()
            .filter_map(|f| f.triangulation.as_ref())
            .map(Triangulation::num_triangles)
            .sum()
    }

    /// All face triangulations merged into one mesh.
    pub fn combined_triangulation(&self) -> Triangulation {
        let mut mesh = Triangulation::default();
        for tri in self.faces().filter_map(|f| f.triangulation.as_ref()) {
            mesh.merge(tri);
        }
        mesh
    }

    /// Drop every face triangulation.
    pub fn clear_triangulation(&mut self) {
        for face in self.faces_mut() {
            face.triangulation = None;
        }
    }

    /// Axis-aligned bounds of all edge end points, `None` for an empty shape.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let mut points = self
            .faces()
            .flat_map(|f| f.wires.iter())
            .flat_map(|w| w.edges.iter())
            .flat_map(|e| [e.start, e.end]);
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (lo.inf(&p), hi.sup(&p))
        }))
    }

    /// A new shape mapped through `sim`. The source is left untouched and the
    /// copy carries no triangulation.
    pub fn transformed(&self, sim: &Similarity) -> Result<Shape, TransformError> {
        sim.validate()?;
        Ok(Shape {
            name: self.name.clone(),
            bodies: self.bodies.iter().map(|b| b.transformed(sim)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dir3, Vec3};
    use approx::assert_relative_eq;

    fn square_face(size: f64) -> Face {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(size, 0.0, 0.0),
            Point3::new(size, size, 0.0),
            Point3::new(0.0, size, 0.0),
        ];
        Face::new(
            Surface::Plane {
                origin: Point3::origin(),
                x: Dir3::new_normalize(Vec3::x()),
                y: Dir3::new_normalize(Vec3::y()),
                normal: Dir3::new_normalize(Vec3::z()),
            },
            vec![Wire::polygon(&pts)],
            Some(0),
            true,
        )
    }

    #[test]
    fn polygon_wire_closes() {
        let face = square_face(2.0);
        let wire = &face.wires[0];
        assert_eq!(wire.edges.len(), 4);
        assert_eq!(wire.edges[3].end, wire.edges[0].start);
    }

    #[test]
    fn transformed_scales_and_keeps_source() {
        let mut face = square_face(10.0);
        face.triangulation = Some(Triangulation::default());
        let shape = Shape::new(
            "plate",
            vec![Body {
                name: "plate".into(),
                faces: vec![face],
                closed: false,
            }],
        );
        let scaled = shape.transformed(&Similarity::uniform_scale(0.5)).unwrap();

        let (_, hi) = scaled.bounding_box().unwrap();
        assert_relative_eq!(hi.x, 5.0, epsilon = 1e-12);
        assert!(!scaled.is_meshed());
        assert!(shape.is_meshed());
        let (_, hi) = shape.bounding_box().unwrap();
        assert_relative_eq!(hi.x, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn triangulation_merge_reindexes() {
        let tri = Triangulation {
            nodes: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2]],
        };
        let mut merged = tri.clone();
        merged.merge(&tri);
        assert_eq!(merged.triangles[1], [3, 4, 5]);
        assert_relative_eq!(merged.area(), 1.0, epsilon = 1e-12);
    }
}
