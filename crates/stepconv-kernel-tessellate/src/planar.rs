//! Planar faces: project the boundary into the plane, bridge holes into the
//! outer loop, and ear-clip the resulting simple polygon.

use std::ops::Range;

use stepconv_kernel_brep::{Face, Point3, Triangulation};

use crate::edges::sample_wire;
use crate::MeshParams;

pub(crate) type Point2 = (f64, f64);

pub(crate) fn tessellate_planar_face(face: &Face, params: &MeshParams) -> Option<Triangulation> {
    let (origin, x, y, _) = face.surface.plane_frame()?;
    let project = |p: &Point3| {
        let d = p - origin;
        (d.dot(&x), d.dot(&y))
    };

    let mut loops: Vec<(usize, Vec<Point3>, Vec<Point2>)> = face
        .wires
        .iter()
        .enumerate()
        .map(|(i, wire)| (i, sample_wire(wire, params)))
        .filter(|(_, points)| points.len() >= 3)
        .map(|(i, points)| {
            let flat = points.iter().map(&project).collect();
            (i, points, flat)
        })
        .collect();
    if loops.is_empty() {
        return None;
    }

    // The marked outer bound, else the loop enclosing the most area.
    let outer = face
        .outer
        .and_then(|o| loops.iter().position(|(i, ..)| *i == o))
        .or_else(|| {
            loops
                .iter()
                .enumerate()
                .max_by(|a, b| {
                    polygon_area_2d(&a.1 .2)
                        .abs()
                        .total_cmp(&polygon_area_2d(&b.1 .2).abs())
                })
                .map(|(k, _)| k)
        })?;
    let (_, mut nodes, mut flat) = loops.swap_remove(outer);
    let outer = 0..flat.len();
    let mut holes = Vec::with_capacity(loops.len());
    for (_, hole_nodes, hole_flat) in loops {
        holes.push(nodes.len()..nodes.len() + hole_flat.len());
        nodes.extend(hole_nodes);
        flat.extend(hole_flat);
    }

    let triangles = triangulate_with_holes(&flat, outer, &holes);
    Some(Triangulation { nodes, triangles })
}

/// Triangulate the polygon `outer` minus `holes`, each a range of `verts`.
/// Loops may run either way round; triangles come out counter-clockwise.
pub(crate) fn triangulate_with_holes(
    verts: &[Point2],
    outer: Range<usize>,
    holes: &[Range<usize>],
) -> Vec<[u32; 3]> {
    let oriented = |range: &Range<usize>, ccw: bool| {
        let mut ring: Vec<usize> = range.clone().collect();
        if (ring_area(verts, &ring) > 0.0) != ccw {
            ring.reverse();
        }
        ring
    };
    let holes: Vec<Vec<usize>> = holes
        .iter()
        .filter(|hole| hole.len() >= 3)
        .map(|hole| oriented(hole, false))
        .collect();
    let polygon = bridge_holes(verts, oriented(&outer, true), &holes);
    let mut triangles = Vec::with_capacity(polygon.len());
    ear_clip_triangulate(verts, &polygon, &mut triangles);
    triangles
}

fn ring_area(verts: &[Point2], ring: &[usize]) -> f64 {
    let points: Vec<Point2> = ring.iter().map(|&i| verts[i]).collect();
    polygon_area_2d(&points)
}

/// Signed area; positive for counter-clockwise loops.
pub(crate) fn polygon_area_2d(pts: &[Point2]) -> f64 {
    let n = pts.len();
    (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum::<f64>()
        / 2.0
}

/// Splice each hole into the outer ring through a zero-width bridge from
/// the nearest visible ring vertex. Loops are indices into `verts`; the
/// outer ring runs counter-clockwise and holes clockwise.
fn bridge_holes(verts: &[Point2], outer: Vec<usize>, holes: &[Vec<usize>]) -> Vec<usize> {
    let mut ring = outer;
    let mut used_bridge_vertices = std::collections::HashSet::new();

    for (hole_idx, hole) in holes.iter().enumerate() {
        // (dist², position in hole, ring position)
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (at, &h) in hole.iter().enumerate() {
            for (pos, &r) in ring.iter().enumerate() {
                let (a, b) = (verts[h], verts[r]);
                candidates.push(((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2), at, pos));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let pending = &holes[hole_idx + 1..];
        let choice = candidates
            .iter()
            .find(|(_, at, pos)| {
                !used_bridge_vertices.contains(&ring[*pos])
                    && bridge_is_clear(verts, &ring, hole, pending, hole[*at], ring[*pos])
            })
            .or_else(|| candidates.first());
        let Some(&(_, at, pos)) = choice else {
            continue;
        };
        used_bridge_vertices.insert(ring[pos]);

        let len = hole.len();
        let mut merged = Vec::with_capacity(ring.len() + len + 2);
        merged.extend_from_slice(&ring[..=pos]);
        merged.extend((0..len).map(|i| hole[(at + i) % len]));
        merged.push(hole[at]);
        merged.push(ring[pos]);
        merged.extend_from_slice(&ring[pos + 1..]);
        ring = merged;
    }
    ring
}

/// Whether the segment `h`–`r` crosses no edge of the ring or of any hole
/// still to be bridged.
fn bridge_is_clear(
    verts: &[Point2],
    ring: &[usize],
    hole: &[usize],
    pending: &[Vec<usize>],
    h: usize,
    r: usize,
) -> bool {
    let (p, q) = (verts[h], verts[r]);
    let edges_of = |ring: &[usize]| {
        let len = ring.len();
        (0..len).map(move |i| (ring[i], ring[(i + 1) % len])).collect::<Vec<_>>()
    };
    let mut edges = edges_of(ring);
    edges.extend(edges_of(hole));
    for other in pending {
        edges.extend(edges_of(other));
    }
    !edges
        .into_iter()
        .filter(|&(a, b)| a != h && b != h && a != r && b != r)
        .any(|(a, b)| segments_cross(p, q, verts[a], verts[b]))
}

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Proper intersection of segments `p1p2` and `p3p4`.
fn segments_cross(p1: Point2, p2: Point2, p3: Point2, p4: Point2) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Ear clipping over a counter-clockwise polygon given as indices into
/// `verts`. Emits counter-clockwise triangles.
fn ear_clip_triangulate(verts: &[Point2], indices: &[usize], out: &mut Vec<[u32; 3]>) {
    if indices.len() < 3 {
        return;
    }
    let mut remaining: Vec<usize> = indices.to_vec();

    while remaining.len() > 3 {
        let n = remaining.len();
        let mut ear = None;
        let mut most_convex: Option<(f64, usize)> = None;

        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let a = verts[remaining[prev]];
            let b = verts[remaining[i]];
            let c = verts[remaining[next]];

            let turn = cross(a, b, c);
            if turn <= 0.0 {
                continue;
            }
            if most_convex.map_or(true, |(best, _)| turn > best) {
                most_convex = Some((turn, i));
            }
            let blocked = (0..n)
                .filter(|&j| j != prev && j != i && j != next)
                .any(|j| point_in_triangle_2d(verts[remaining[j]], a, b, c));
            if !blocked {
                ear = Some(i);
                break;
            }
        }

        // Self-touching input can leave no clean ear; clip the most convex
        // corner so the loop still terminates.
        let Some(i) = ear.or(most_convex.map(|(_, i)| i)) else {
            break;
        };
        let n = remaining.len();
        out.push([
            remaining[(i + n - 1) % n] as u32,
            remaining[i] as u32,
            remaining[(i + 1) % n] as u32,
        ]);
        remaining.remove(i);
    }

    if remaining.len() == 3 && cross(verts[remaining[0]], verts[remaining[1]], verts[remaining[2]]) > 0.0 {
        out.push([remaining[0] as u32, remaining[1] as u32, remaining[2] as u32]);
    }
}

/// Check if a point is strictly inside a triangle using barycentric
/// coordinates.
fn point_in_triangle_2d(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let v0 = (c.0 - a.0, c.1 - a.1);
    let v1 = (b.0 - a.0, b.1 - a.1);
    let v2 = (p.0 - a.0, p.1 - a.1);

    let dot00 = v0.0 * v0.0 + v0.1 * v0.1;
    let dot01 = v0.0 * v1.0 + v0.1 * v1.1;
    let dot02 = v0.0 * v2.0 + v0.1 * v2.1;
    let dot11 = v1.0 * v1.0 + v1.1 * v1.1;
    let dot12 = v1.0 * v2.0 + v1.1 * v2.1;

    let inv_denom = 1.0 / (dot00 * dot11 - dot01 * dot01);
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    let eps = 1e-10;
    u > eps && v > eps && (u + v) < 1.0 - eps
}
