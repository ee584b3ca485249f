//! Vertices, edges, loops, faces, shells, and bodies.

use stepconv_kernel_brep::{frame, Body, Dir3, Edge, Face, Point3, Surface, Vec3, Wire};

use super::Entities;
use crate::error::StepError;

/// Representation items that become a [`Body`].
pub const BODY_TYPES: &[&str] = &[
    "MANIFOLD_SOLID_BREP",
    "BREP_WITH_VOIDS",
    "FACETED_BREP",
    "SHELL_BASED_SURFACE_MODEL",
];

const FACE_TYPES: &[&str] = &["ADVANCED_FACE", "FACE_SURFACE", "FACE"];
const SHELL_TYPES: &[&str] = &["CLOSED_SHELL", "OPEN_SHELL", "ORIENTED_CLOSED_SHELL"];

impl Entities<'_> {
    /// VERTEX_POINT location.
    pub fn vertex(&self, id: u64) -> Result<Point3, StepError> {
        let args = self.instance(id, &["VERTEX_POINT"])?;
        self.point(args.entity_ref(1)?)
    }

    /// EDGE_CURVE in its own orientation.
    pub fn edge_curve(&self, id: u64) -> Result<Edge, StepError> {
        let args = self.instance(id, &["EDGE_CURVE"])?;
        Ok(Edge {
            start: self.vertex(args.entity_ref(1)?)?,
            end: self.vertex(args.entity_ref(2)?)?,
            curve: self.curve(args.entity_ref(3)?)?,
            same_sense: args.logical(4)?,
        })
    }

    /// ORIENTED_EDGE, flipped when its orientation is `.F.`.
    pub fn oriented_edge(&self, id: u64) -> Result<Edge, StepError> {
        let args = self.instance(id, &["ORIENTED_EDGE"])?;
        let edge = self.edge_curve(args.entity_ref(3)?)?;
        Ok(if args.logical(4)? { edge } else { reversed(edge) })
    }

    /// EDGE_LOOP, POLY_LOOP, or VERTEX_LOOP (which yields an empty wire).
    pub fn wire(&self, id: u64) -> Result<Wire, StepError> {
        let args = self.instance(id, &["EDGE_LOOP", "POLY_LOOP", "VERTEX_LOOP"])?;
        match args.type_name() {
            "EDGE_LOOP" => {
                let edges = args
                    .refs(1)?
                    .into_iter()
                    .map(|edge| self.oriented_edge(edge))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Wire { edges })
            }
            "POLY_LOOP" => {
                let points = args
                    .refs(1)?
                    .into_iter()
                    .map(|p| self.point(p))
                    .collect::<Result<Vec<_>, _>>()?;
                if points.len() < 3 {
                    return Err(StepError::geometry(id, "poly loop needs 3 points"));
                }
                Ok(Wire::polygon(&points))
            }
            _ => Ok(Wire::default()),
        }
    }

    /// FACE_BOUND or FACE_OUTER_BOUND: the wire in face orientation and
    /// whether it is the outer bound.
    pub fn face_bound(&self, id: u64) -> Result<(Wire, bool), StepError> {
        let args = self.instance(id, &["FACE_BOUND", "FACE_OUTER_BOUND"])?;
        let wire = self.wire(args.entity_ref(1)?)?;
        let wire = if args.logical(2)? {
            wire
        } else {
            Wire {
                edges: wire.edges.into_iter().rev().map(reversed).collect(),
            }
        };
        Ok((wire, args.type_name() == "FACE_OUTER_BOUND"))
    }

    /// ADVANCED_FACE, FACE_SURFACE, or a plain FACE (whose plane is fitted
    /// to its first bound).
    pub fn face(&self, id: u64) -> Result<Face, StepError> {
        let args = self.instance(id, FACE_TYPES)?;
        let mut wires = Vec::new();
        let mut outer = None;
        for bound in args.refs(1)? {
            let (wire, is_outer) = self.face_bound(bound)?;
            if is_outer && outer.is_none() {
                outer = Some(wires.len());
            }
            wires.push(wire);
        }
        if args.type_name() == "FACE" {
            let fit = wires
                .get(outer.unwrap_or(0))
                .and_then(fitted_plane)
                .ok_or_else(|| StepError::geometry(id, "cannot fit a plane to face bound"))?;
            return Ok(Face::new(fit, wires, outer, true));
        }
        let surface = self.surface(args.entity_ref(2)?)?;
        Ok(Face::new(surface, wires, outer, args.logical(3)?))
    }

    /// Faces of a shell and whether it is closed. A reversed
    /// ORIENTED_CLOSED_SHELL flips every face.
    pub fn shell(&self, id: u64) -> Result<(Vec<Face>, bool), StepError> {
        let args = self.instance(id, SHELL_TYPES)?;
        if args.type_name() == "ORIENTED_CLOSED_SHELL" {
            let (mut faces, closed) = self.shell(args.entity_ref(2)?)?;
            if !args.logical(3)? {
                for face in &mut faces {
                    face.same_sense = !face.same_sense;
                }
            }
            return Ok((faces, closed));
        }
        let faces = args
            .refs(1)?
            .into_iter()
            .map(|face| self.face(face))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((faces, args.type_name() != "OPEN_SHELL"))
    }

    /// A solid or surface model; see [`BODY_TYPES`].
    pub fn body(&self, id: u64) -> Result<Body, StepError> {
        let args = self.instance(id, BODY_TYPES)?;
        let name = args.string(0)?.to_string();
        let shells = match args.type_name() {
            "SHELL_BASED_SURFACE_MODEL" => args.refs(1)?,
            "BREP_WITH_VOIDS" => {
                let mut shells = vec![args.entity_ref(1)?];
                shells.extend(args.refs(2)?);
                shells
            }
            _ => vec![args.entity_ref(1)?],
        };
        let mut faces = Vec::new();
        let mut closed = true;
        for shell in shells {
            let (shell_faces, shell_closed) = self.shell(shell)?;
            faces.extend(shell_faces);
            closed &= shell_closed;
        }
        Ok(Body {
            name,
            faces,
            closed,
        })
    }

    /// Every body in the file, in ID order, once per assembly placement.
    pub fn bodies(&self) -> Result<Vec<Body>, StepError> {
        let assembly = self.assembly()?;
        let mut bodies = Vec::new();
        for entity in self.file().instances_of(BODY_TYPES) {
            let body = self.body(entity.id)?;
            for placement in assembly.placements(entity.id) {
                if placement.is_identity() {
                    bodies.push(body.clone());
                } else {
                    bodies.push(body.transformed(&placement));
                }
            }
        }
        Ok(bodies)
    }
}

fn reversed(edge: Edge) -> Edge {
    Edge {
        start: edge.end,
        end: edge.start,
        curve: edge.curve,
        same_sense: !edge.same_sense,
    }
}

/// Plane through the wire's vertices with the Newell normal.
fn fitted_plane(wire: &Wire) -> Option<Surface> {
    let points: Vec<Point3> = wire.edges.iter().map(|e| e.start).collect();
    let n = points.len();
    if n < 3 {
        return None;
    }
    let mut normal = Vec3::zeros();
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    if normal.norm() < 1e-12 {
        return None;
    }
    let (x, y, normal) = frame(Dir3::new_normalize(normal), Some(points[1] - points[0]));
    Some(Surface::Plane {
        origin: points[0],
        x,
        y,
        normal,
    })
}
