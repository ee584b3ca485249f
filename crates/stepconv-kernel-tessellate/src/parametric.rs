//! Faces on curved surfaces, meshed in their `(u, v)` parameter plane.
//!
//! Boundary samples are projected into `(u, v)`. On surfaces of revolution
//! the angles are unwrapped across the seam, a walk through a pole follows
//! the pole line, and seam edges (run once each way) are dropped so the
//! face becomes a band between the loops that wind around the axis. The
//! trimmed region is triangulated in the parameter plane, cut along a
//! deflection-driven parameter grid, and mapped back onto the surface.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};

use log::debug;
use stepconv_kernel_brep::{
    BSplineSurface, Curve, Face, Point3, Surface, Triangulation, Wire, EPSILON,
};

use crate::edges::{arc_segments, curve_segments, sample_wire};
use crate::planar::{polygon_area_2d, triangulate_with_holes, Point2};
use crate::MeshParams;

type Uv = Point2;
type Range = (f64, f64);

const SPAN_EPS: f64 = 1e-9;

/// A boundary loop in the parameter plane with its net turns around the
/// `u` and `v` periods.
#[derive(Debug, Clone)]
struct UvLoop {
    points: Vec<Uv>,
    turns: (i64, i64),
    outer: bool,
}

/// Trimmed parameter region: an outer polygon minus holes.
#[derive(Debug, Clone, Default, PartialEq)]
struct Region {
    outer: Vec<Uv>,
    holes: Vec<Vec<Uv>>,
}

impl Region {
    fn rectangle((u0, u1): Range, (v0, v1): Range) -> Self {
        Region {
            outer: vec![(u0, v0), (u1, v0), (u1, v1), (u0, v1)],
            holes: Vec::new(),
        }
    }

    fn transposed(self) -> Self {
        let swap = |ring: Vec<Uv>| -> Vec<Uv> { ring.into_iter().map(|(u, v)| (v, u)).collect() };
        Region {
            outer: swap(self.outer),
            holes: self.holes.into_iter().map(swap).collect(),
        }
    }

    fn bounds(&self) -> (Range, Range) {
        bounds(&self.outer)
    }
}

/// Whether the face has something to mesh: a boundary, or a surface that
/// closes on itself.
pub(crate) fn is_bounded(face: &Face) -> bool {
    face.wires.iter().any(|w| !w.is_empty()) || natural_domain(&face.surface).is_some()
}

pub(crate) fn tessellate_parametric_face(face: &Face, params: &MeshParams) -> Option<Triangulation> {
    let surface = &face.surface;
    let loops = parameter_loops(face, params)?;
    let regions = if loops.is_empty() {
        let (u, v) = natural_domain(surface)?;
        vec![Region::rectangle(u, v)]
    } else {
        match regions(surface, loops.clone(), face.same_sense) {
            Some(regions) if !regions.is_empty() => regions,
            _ => {
                debug!("{} face: trimming not resolved, meshing its parameter bounds", surface.kind());
                vec![bounding_region(surface, &loops)?]
            }
        }
    };

    let mut mesh = Triangulation::default();
    for region in &regions {
        let (u, v) = region.bounds();
        if u.1 - u.0 <= SPAN_EPS || v.1 - v.0 <= SPAN_EPS {
            continue;
        }
        let (u_lines, v_lines) = grid_lines(surface, u, v, params)?;
        let piece = if region.holes.is_empty()
            && polygon_area_2d(&region.outer).abs() >= (1.0 - 1e-6) * (u.1 - u.0) * (v.1 - v.0)
        {
            grid(surface, &u_lines, &v_lines)?
        } else {
            clipped(surface, region, &u_lines, &v_lines)?
        };
        append(&mut mesh, piece);
    }
    Some(mesh)
}

/// Angle difference folded into `[-π, π]`.
fn wrap_angle(d: f64) -> f64 {
    d - TAU * (d / TAU).round()
}

fn bounds(points: &[Uv]) -> (Range, Range) {
    points.iter().fold(
        ((f64::INFINITY, f64::NEG_INFINITY), (f64::INFINITY, f64::NEG_INFINITY)),
        |((u0, u1), (v0, v1)), &(u, v)| ((u0.min(u), u1.max(u)), (v0.min(v), v1.max(v))),
    )
}

/// Parameter domain of a surface that needs no trimming.
fn natural_domain(surface: &Surface) -> Option<(Range, Range)> {
    match surface {
        Surface::BSpline(spline) => Some(spline.domain()),
        _ => Some(((0.0, TAU), surface.natural_v_range()?)),
    }
}

/// Which parameters repeat every full turn.
fn periodic(surface: &Surface) -> (bool, bool) {
    (
        surface.is_revolution(),
        matches!(surface, Surface::Torus { .. }),
    )
}

/// Split a wire at seam edges: pairs of edges running along the same curve
/// in opposite directions. A straight edge carries no direction of its own,
/// so any reversed pair of them is a seam. Pieces that do not close are left
/// joined.
fn without_seams(wire: &Wire) -> Vec<Wire> {
    let edges = &wire.edges;
    let n = edges.len();
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (&edges[i], &edges[j]);
            let seam = a.curve == b.curve
                && (a.curve == Curve::Line || a.same_sense != b.same_sense)
                && (a.start - b.end).norm() <= EPSILON
                && (a.end - b.start).norm() <= EPSILON;
            if !seam {
                continue;
            }
            let inner = Wire {
                edges: edges[i + 1..j].to_vec(),
            };
            let outer = Wire {
                edges: edges[j + 1..].iter().chain(&edges[..i]).cloned().collect(),
            };
            if [&inner, &outer].iter().all(|w| closes(w)) {
                return [inner, outer]
                    .iter()
                    .filter(|w| !w.is_empty())
                    .flat_map(without_seams)
                    .collect();
            }
        }
    }
    vec![wire.clone()]
}

fn closes(wire: &Wire) -> bool {
    match (wire.edges.first(), wire.edges.last()) {
        (Some(first), Some(last)) => (last.end - first.start).norm() <= EPSILON,
        _ => true,
    }
}

/// Boundary loops in the parameter plane. `None` when a sample cannot be
/// projected.
fn parameter_loops(face: &Face, params: &MeshParams) -> Option<Vec<UvLoop>> {
    let surface = &face.surface;
    let mut samples: Vec<(bool, Vec<Point3>)> = Vec::new();
    for (i, wire) in face.wires.iter().enumerate() {
        let outer = face.outer == Some(i);
        let pieces = if surface.is_revolution() {
            without_seams(wire)
        } else {
            vec![wire.clone()]
        };
        for piece in pieces {
            let points = sample_wire(&piece, params);
            if points.len() >= 3 {
                samples.push((outer, points));
            }
        }
    }

    if let Surface::BSpline(spline) = surface {
        return Some(
            samples
                .into_iter()
                .map(|(outer, points)| UvLoop {
                    points: project_spline(spline, &points),
                    turns: (0, 0),
                    outer,
                })
                .collect(),
        );
    }

    let reach = samples
        .iter()
        .flat_map(|(_, points)| points)
        .filter_map(|p| surface.axis_distance(p))
        .fold(0.0_f64, f64::max);
    samples
        .into_iter()
        .map(|(outer, points)| {
            let (points, turns) = unwrap_revolution(surface, &points, face.same_sense, reach * 1e-7)?;
            Some(UvLoop {
                points,
                turns,
                outer,
            })
        })
        .collect()
}

fn project_spline(spline: &BSplineSurface, points: &[Point3]) -> Vec<Uv> {
    let mut hint = None;
    points
        .iter()
        .map(|p| {
            let uv = spline.project(p, hint);
            hint = Some(uv);
            uv
        })
        .collect()
}

/// Unwrapped `(u, v)` of a closed loop on a surface of revolution and its
/// net turns. Samples on the axis have no `u` of their own; the walk runs
/// along the pole line to the `u` of the next sample, going the way that
/// keeps the face on the correct side.
fn unwrap_revolution(
    surface: &Surface,
    points: &[Point3],
    same_sense: bool,
    pole_tolerance: f64,
) -> Option<(Vec<Uv>, (i64, i64))> {
    let wrap_v = matches!(surface, Surface::Torus { .. });
    let raw = points
        .iter()
        .map(|p| Some((surface.project(p)?, surface.axis_distance(p)? <= pole_tolerance)))
        .collect::<Option<Vec<(Uv, bool)>>>()?;
    let start = raw.iter().position(|(_, pole)| !pole)?;
    let n = raw.len();
    let at = |k: usize| raw[(start + k) % n];

    let ((u0, v0), _) = raw[start];
    let (mut u, mut v) = (u0, v0);
    let mut out = Vec::with_capacity(n + 2);
    out.push((u, v));
    for k in 1..=n {
        let ((raw_u, raw_v), pole) = at(k);
        let next_v = if wrap_v { v + wrap_angle(raw_v - v) } else { raw_v };
        if pole {
            let ((next_u, _), _) = (k + 1..=n).map(|j| at(j)).find(|(_, pole)| !pole)?;
            let forward = (next_v > v) != same_sense;
            out.push((u, next_v));
            u += pole_jump(u, next_u, forward);
            out.push((u, next_v));
        } else {
            u += wrap_angle(raw_u - u);
            if k < n {
                out.push((u, next_v));
            }
        }
        v = next_v;
    }
    let turns = |d: f64| (d / TAU).round() as i64;
    let turns_v = if wrap_v { turns(v - v0) } else { 0 };
    Some((out, (turns(u - u0), turns_v)))
}

/// Signed travel along a pole line from the angle `from` to `to`; a full
/// turn when they coincide.
fn pole_jump(from: f64, to: f64, forward: bool) -> f64 {
    let ahead = (to - from).rem_euclid(TAU);
    let jump = if forward { ahead } else { ahead - TAU };
    if jump.abs() < SPAN_EPS || TAU - jump.abs() < SPAN_EPS {
        if forward {
            TAU
        } else {
            -TAU
        }
    } else {
        jump
    }
}

/// The trimmed regions bounded by `loops`, or `None` when the loops do not
/// describe a region consistently.
fn regions(surface: &Surface, loops: Vec<UvLoop>, same_sense: bool) -> Option<Vec<Region>> {
    let (u_periodic, v_periodic) = periodic(surface);
    let (closed, winding): (Vec<UvLoop>, Vec<UvLoop>) =
        loops.into_iter().partition(|l| l.turns == (0, 0));

    if winding.is_empty() {
        return polygon_region(closed, (u_periodic, v_periodic)).map(|r| vec![r]);
    }
    if winding.iter().all(|l| l.turns.1 == 0) {
        return band_regions(surface, winding, closed, same_sense, v_periodic);
    }
    if v_periodic && winding.iter().all(|l| l.turns.0 == 0) {
        // Loops around the tube: the same construction with u and v swapped.
        let swap = |l: UvLoop| UvLoop {
            points: l.points.into_iter().map(|(u, v)| (v, u)).collect(),
            turns: (l.turns.1, l.turns.0),
            outer: l.outer,
        };
        let winding = winding.into_iter().map(swap).collect();
        let closed = closed.into_iter().map(swap).collect();
        let regions = band_regions(surface, winding, closed, !same_sense, true)?;
        return Some(regions.into_iter().map(Region::transposed).collect());
    }
    None
}

/// Region of loops that all close in the parameter plane: the marked outer
/// loop (else the largest) minus the others.
fn polygon_region(mut loops: Vec<UvLoop>, periodic: (bool, bool)) -> Option<Region> {
    let outer = loops.iter().position(|l| l.outer).or_else(|| {
        loops
            .iter()
            .enumerate()
            .max_by(|a, b| {
                polygon_area_2d(&a.1.points)
                    .abs()
                    .total_cmp(&polygon_area_2d(&b.1.points).abs())
            })
            .map(|(k, _)| k)
    })?;
    let outer = loops.swap_remove(outer).points;
    let holes = loops
        .into_iter()
        .filter_map(|hole| placed(hole.points, &outer, periodic))
        .collect();
    Some(Region { outer, holes })
}

/// Regions between loops winding once around `u`. A loop with the face on
/// its upper side is a lower boundary; a missing partner is the pole on
/// that side, or on a torus the loop itself one period further.
fn band_regions(
    surface: &Surface,
    winding: Vec<UvLoop>,
    holes: Vec<UvLoop>,
    same_sense: bool,
    v_periodic: bool,
) -> Option<Vec<Region>> {
    if winding.iter().any(|l| l.turns.0.abs() != 1) {
        return None;
    }
    let cut = seam_cut(&holes)?;
    let mut lines: Vec<(f64, bool, Vec<Uv>)> = Vec::with_capacity(winding.len());
    for l in winding {
        let lower = (l.turns.0 > 0) == same_sense;
        let mut points = l.points;
        if l.turns.0 < 0 {
            points.reverse();
        }
        let line = open_at(&points, cut)?;
        let mean = line.iter().map(|p| p.1).sum::<f64>() / line.len() as f64;
        lines.push((mean, lower, line));
    }
    lines.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut bands: Vec<(Vec<Uv>, Vec<Uv>)> = Vec::new();
    if v_periodic {
        if let [(_, lower, line)] = lines.as_slice() {
            let (lo, hi) = if *lower {
                (line.clone(), shifted(line, (0.0, TAU)))
            } else {
                (shifted(line, (0.0, -TAU)), line.clone())
            };
            bands.push((lo, hi));
        } else {
            let first = lines.iter().position(|l| l.1)?;
            lines.rotate_left(first);
            for pair in lines.chunks(2) {
                let [(lo_mean, true, lo), (up_mean, false, up)] = pair else {
                    return None;
                };
                let up = if up_mean < lo_mean {
                    shifted(up, (0.0, TAU))
                } else {
                    up.clone()
                };
                bands.push((lo.clone(), up));
            }
        }
    } else {
        let mut i = 0;
        while i < lines.len() {
            let (mean, lower, line) = &lines[i];
            if !lower {
                bands.push((pole_line(surface, *mean, false, cut)?, line.clone()));
                i += 1;
                continue;
            }
            match lines.get(i + 1) {
                Some((_, false, upper)) => {
                    bands.push((line.clone(), upper.clone()));
                    i += 2;
                }
                Some(_) => return None,
                None => {
                    bands.push((line.clone(), pole_line(surface, *mean, true, cut)?));
                    i += 1;
                }
            }
        }
    }

    let mut regions: Vec<Region> = bands
        .into_iter()
        .map(|(lower, upper)| Region {
            outer: lower.into_iter().chain(upper.into_iter().rev()).collect(),
            holes: Vec::new(),
        })
        .collect();
    for hole in holes {
        let home = regions.iter_mut().find_map(|region| {
            let hole = placed(hole.points.clone(), &region.outer, (true, v_periodic))?;
            Some((region, hole))
        });
        match home {
            Some((region, hole)) => region.holes.push(hole),
            None => debug!("dropping a hole outside every band"),
        }
    }
    Some(regions)
}

/// The line `v = pole` across one period from `cut`, for the pole above
/// (`upper`) or below `beyond`.
fn pole_line(surface: &Surface, beyond: f64, upper: bool, cut: f64) -> Option<Vec<Uv>> {
    let v = match surface {
        Surface::Sphere { .. } => {
            if upper {
                FRAC_PI_2
            } else {
                -FRAC_PI_2
            }
        }
        Surface::Cone {
            radius, semi_angle, ..
        } if semi_angle.tan().abs() > EPSILON => {
            let apex = -radius / semi_angle.tan();
            if (apex > beyond) != upper {
                return None;
            }
            apex
        }
        _ => return None,
    };
    Some(vec![(cut, v), (cut + TAU, v)])
}

/// A `u` at which a band can be opened without cutting through a hole.
fn seam_cut(holes: &[UvLoop]) -> Option<f64> {
    if holes.is_empty() {
        return Some(0.0);
    }
    let mut spans: Vec<Range> = holes
        .iter()
        .map(|hole| {
            let ((lo, hi), _) = bounds(&hole.points);
            let start = lo.rem_euclid(TAU);
            (start, start + (hi - lo))
        })
        .collect();
    if spans.iter().any(|(lo, hi)| hi - lo >= TAU) {
        return None;
    }
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut best: Option<Range> = None;
    let mut consider = |gap: Range| {
        if gap.1 > gap.0 && best.map_or(true, |b| gap.1 - gap.0 > b.1 - b.0) {
            best = Some(gap);
        }
    };
    let mut reach = spans[0].1;
    for &(lo, hi) in &spans[1..] {
        consider((reach, lo));
        reach = reach.max(hi);
    }
    consider((reach, spans[0].0 + TAU));
    best.map(|(lo, hi)| ((lo + hi) / 2.0).rem_euclid(TAU))
}

/// Cut a loop winding once in `+u` at `u = at`; the open line runs from
/// `at` to `at + 2π`.
fn open_at(points: &[Uv], at: f64) -> Option<Vec<Uv>> {
    let n = points.len();
    let shift = TAU * ((points[0].0 - at) / TAU).ceil();
    let ext = |i: usize| {
        let (u, v) = points[i % n];
        (u - shift + TAU * (i / n) as f64, v)
    };
    let i = (0..n).find(|&i| ext(i).0 <= at && at < ext(i + 1).0)?;
    let (a, b) = (ext(i), ext(i + 1));
    let start = (at, a.1 + (at - a.0) / (b.0 - a.0) * (b.1 - a.1));

    let mut line = vec![start];
    line.extend((i + 1..=i + n).map(|k| ext(k)));
    line.push((start.0 + TAU, start.1));
    line.dedup_by(|x, y| (x.0 - y.0).abs() <= SPAN_EPS && (x.1 - y.1).abs() <= SPAN_EPS);
    Some(line)
}

fn shifted(points: &[Uv], (du, dv): Uv) -> Vec<Uv> {
    points.iter().map(|&(u, v)| (u + du, v + dv)).collect()
}

/// Move a hole by whole periods until its centre falls inside `outer`.
fn placed(hole: Vec<Uv>, outer: &[Uv], periodic: (bool, bool)) -> Option<Vec<Uv>> {
    let centre = |ring: &[Uv]| {
        let n = ring.len() as f64;
        let (u, v) = ring.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (u / n, v / n)
    };
    let (hole_centre, outer_centre) = (centre(&hole), centre(outer));
    let shifts = |on: bool, from: f64, to: f64| {
        if on {
            let k = ((to - from) / TAU).round();
            vec![k * TAU, (k - 1.0) * TAU, (k + 1.0) * TAU]
        } else {
            vec![0.0]
        }
    };
    for du in shifts(periodic.0, hole_centre.0, outer_centre.0) {
        for dv in shifts(periodic.1, hole_centre.1, outer_centre.1) {
            let at = (hole_centre.0 + du, hole_centre.1 + dv);
            if point_in_polygon(at, outer) {
                return Some(shifted(&hole, (du, dv)));
            }
        }
    }
    debug!("hole centred at {hole_centre:?} lies outside its face");
    None
}

fn point_in_polygon((x, y): Uv, ring: &[Uv]) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if (a.1 > y) != (b.1 > y) && x < a.0 + (y - a.1) / (b.1 - a.1) * (b.0 - a.0) {
            inside = !inside;
        }
    }
    inside
}

/// Bounding rectangle of all loops, a full turn wide along any period the
/// boundary wraps. `None` when it has no extent.
fn bounding_region(surface: &Surface, loops: &[UvLoop]) -> Option<Region> {
    let all: Vec<Uv> = loops.iter().flat_map(|l| l.points.iter().copied()).collect();
    let (u, v) = bounds(&all);
    let (u_periodic, v_periodic) = periodic(surface);
    let close = |range: Range, on: bool, wraps: bool| {
        let span = range.1 - range.0;
        if on && (wraps || span < SPAN_EPS || span >= TAU - 1e-6) {
            (range.0, range.0 + TAU)
        } else {
            range
        }
    };
    let u = close(u, u_periodic, loops.iter().any(|l| l.turns.0 != 0));
    let v = match (close(v, v_periodic, loops.iter().any(|l| l.turns.1 != 0)), surface) {
        (v, _) if v.1 - v.0 > SPAN_EPS => v,
        // A sphere bounded by a single parallel at the equator or a pole.
        (_, Surface::Sphere { .. }) => (-FRAC_PI_2, FRAC_PI_2),
        _ => return None,
    };
    Some(Region::rectangle(u, v))
}

/// Parameter lines over the region's bounds in each direction.
fn grid_lines(surface: &Surface, u: Range, v: Range, params: &MeshParams) -> Option<(Vec<f64>, Vec<f64>)> {
    if let Surface::BSpline(spline) = surface {
        return Some((
            spline_lines(spline, true, u, v, params),
            spline_lines(spline, false, v, u, params),
        ));
    }
    let nu = arc_segments(surface.u_radius(v)?, u.1 - u.0, params);
    let nv = match surface.v_radius() {
        Some(r) => arc_segments(r, v.1 - v.0, params),
        None => 1,
    };
    Some((uniform(u, nu), uniform(v, nv)))
}

fn uniform((lo, hi): Range, n: usize) -> Vec<f64> {
    (0..=n).map(|i| lo + (hi - lo) * i as f64 / n as f64).collect()
}

/// Lines along `u` (or `v`) through every knot in `range`, each knot span
/// split until the iso-curves at the ends and middle of `across` meet the
/// deflection limits.
fn spline_lines(spline: &BSplineSurface, along_u: bool, range: Range, across: Range, params: &MeshParams) -> Vec<f64> {
    let (breaks, degree) = if along_u {
        (spline.breaks_u(), spline.degrees().0)
    } else {
        (spline.breaks_v(), spline.degrees().1)
    };
    let mut cuts: Vec<f64> = breaks
        .into_iter()
        .filter(|&k| k > range.0 && k < range.1)
        .chain([range.0, range.1])
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let mut lines = Vec::new();
    for w in cuts.windows(2) {
        let n = [across.0, (across.0 + across.1) / 2.0, across.1]
            .iter()
            .map(|&other| {
                let at = |t: f64| {
                    if along_u {
                        spline.evaluate(t, other)
                    } else {
                        spline.evaluate(other, t)
                    }
                };
                curve_segments(at, w[0], w[1], degree, params)
            })
            .max()
            .unwrap_or(1);
        lines.extend((0..n).map(|i| w[0] + (w[1] - w[0]) * i as f64 / n as f64));
    }
    lines.push(range.1);
    lines
}

/// Full grid over the lines, for regions filling their bounds.
fn grid(surface: &Surface, u_lines: &[f64], v_lines: &[f64]) -> Option<Triangulation> {
    let (nu, nv) = (u_lines.len() - 1, v_lines.len() - 1);
    let mut nodes = Vec::with_capacity(u_lines.len() * v_lines.len());
    for &v in v_lines {
        for &u in u_lines {
            nodes.push(surface.evaluate(u, v)?);
        }
    }

    let idx = |i: usize, j: usize| (j * (nu + 1) + i) as u32;
    let mut triangles = Vec::with_capacity(2 * nu * nv);
    for j in 0..nv {
        for i in 0..nu {
            let (a, b, c, d) = (idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1));
            for tri in [[a, b, c], [a, c, d]] {
                if !is_sliver(&nodes, tri) {
                    triangles.push(tri);
                }
            }
        }
    }
    Some(Triangulation { nodes, triangles })
}

/// Triangulate the region, cut every triangle along the grid cells it
/// covers, and map the pieces onto the surface.
fn clipped(surface: &Surface, region: &Region, u_lines: &[f64], v_lines: &[f64]) -> Option<Triangulation> {
    let mut verts = region.outer.clone();
    let outer = 0..verts.len();
    let mut holes = Vec::with_capacity(region.holes.len());
    for hole in &region.holes {
        holes.push(verts.len()..verts.len() + hole.len());
        verts.extend_from_slice(hole);
    }
    let coarse = triangulate_with_holes(&verts, outer, &holes);

    let mut mesh = Triangulation::default();
    let mut index: HashMap<(u64, u64), u32> = HashMap::new();
    let cells = |lines: &[f64], lo: f64, hi: f64| {
        let first = lines.partition_point(|&x| x <= lo).saturating_sub(1);
        let last = lines.partition_point(|&x| x < hi).min(lines.len() - 1);
        first..last.max(first + 1).min(lines.len() - 1)
    };
    for tri in coarse {
        let corners: Vec<Uv> = tri.iter().map(|&i| verts[i as usize]).collect();
        let ((u0, u1), (v0, v1)) = bounds(&corners);
        for i in cells(u_lines, u0, u1) {
            for j in cells(v_lines, v0, v1) {
                let mut piece = corners.clone();
                for (axis, bound, above) in [
                    (0, u_lines[i], true),
                    (0, u_lines[i + 1], false),
                    (1, v_lines[j], true),
                    (1, v_lines[j + 1], false),
                ] {
                    piece = clip(&piece, axis, bound, above);
                }
                for k in 1..piece.len().saturating_sub(1) {
                    let (a, b, c) = (piece[0], piece[k], piece[k + 1]);
                    if (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0) <= 0.0 {
                        continue;
                    }
                    let corners = [a, b, c].map(|uv| surface.evaluate(uv.0, uv.1));
                    let [Some(pa), Some(pb), Some(pc)] = corners else {
                        return None;
                    };
                    if is_sliver(&[pa, pb, pc], [0, 1, 2]) {
                        continue;
                    }
                    let mut node = |uv: Uv, p: Point3| {
                        let key = ((uv.0 + 0.0).to_bits(), (uv.1 + 0.0).to_bits());
                        *index.entry(key).or_insert_with(|| {
                            mesh.nodes.push(p);
                            (mesh.nodes.len() - 1) as u32
                        })
                    };
                    let tri = [node(a, pa), node(b, pb), node(c, pc)];
                    mesh.triangles.push(tri);
                }
            }
        }
    }
    Some(mesh)
}

/// Sutherland–Hodgman step: keep the part of `polygon` on one side of the
/// line `axis = bound`.
fn clip(polygon: &[Uv], axis: usize, bound: f64, above: bool) -> Vec<Uv> {
    let coord = |p: Uv| if axis == 0 { p.0 } else { p.1 };
    let inside = |p: Uv| if above { coord(p) >= bound } else { coord(p) <= bound };
    let n = polygon.len();
    let mut out = Vec::with_capacity(n + 2);
    for k in 0..n {
        let (a, b) = (polygon[k], polygon[(k + 1) % n]);
        if inside(a) {
            out.push(a);
        }
        if inside(a) != inside(b) {
            // Same endpoint order from either neighbour, so shared cuts agree.
            let (a, b) = if a <= b { (a, b) } else { (b, a) };
            let t = (bound - coord(a)) / (coord(b) - coord(a));
            out.push(if axis == 0 {
                (bound, a.1 + t * (b.1 - a.1))
            } else {
                (a.0 + t * (b.0 - a.0), bound)
            });
        }
    }
    out
}

fn append(mesh: &mut Triangulation, piece: Triangulation) {
    let offset = mesh.nodes.len() as u32;
    mesh.nodes.extend(piece.nodes);
    mesh.triangles
        .extend(piece.triangles.into_iter().map(|t| t.map(|i| i + offset)));
}

/// Triangles collapsed to a segment or point, as at sphere poles.
fn is_sliver(nodes: &[Point3], [a, b, c]: [u32; 3]) -> bool {
    let (a, b, c) = (nodes[a as usize], nodes[b as usize], nodes[c as usize]);
    let (ab, ac, bc) = (b - a, c - a, c - b);
    let longest = ab
        .norm_squared()
        .max(ac.norm_squared())
        .max(bc.norm_squared());
    ab.cross(&ac).norm() <= 1e-9 * longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_shapes::dir;
    use std::f64::consts::PI;
    use stepconv_kernel_brep::{Curve, Edge};

    fn fine() -> MeshParams {
        MeshParams {
            linear_deflection: 0.001,
            angular_deflection: 0.05,
            relative: false,
        }
    }

    fn z_cylinder(radius: f64) -> Surface {
        Surface::Cylinder {
            origin: Point3::origin(),
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius,
        }
    }

    fn z_circle(z: f64, radius: f64) -> Curve {
        Curve::Circle {
            center: Point3::new(0., 0., z),
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius,
        }
    }

    /// Seamed side wire of a cylinder around +Z.
    fn side_wire(r: f64, h: f64) -> Wire {
        let (b, t) = (Point3::new(r, 0., 0.), Point3::new(r, 0., h));
        Wire {
            edges: vec![
                Edge {
                    start: b,
                    end: b,
                    curve: z_circle(0.0, r),
                    same_sense: true,
                },
                Edge::line(b, t),
                Edge {
                    start: t,
                    end: t,
                    curve: z_circle(h, r),
                    same_sense: false,
                },
                Edge::line(t, b),
            ],
        }
    }

    fn faces_outward(mesh: &Triangulation) -> bool {
        mesh.corners().all(|[a, b, c]| {
            let n = (b - a).cross(&(c - a));
            let mid = (a.coords + b.coords + c.coords) / 3.0;
            n.x * mid.x + n.y * mid.y > 0.0
        })
    }

    #[test]
    fn half_cylinder_covers_its_arc() {
        let (a, b) = (Point3::new(5., 0., 0.), Point3::new(-5., 0., 0.));
        let (c, d) = (Point3::new(-5., 0., 10.), Point3::new(5., 0., 10.));
        let wire = Wire {
            edges: vec![
                Edge {
                    start: a,
                    end: b,
                    curve: z_circle(0.0, 5.0),
                    same_sense: true,
                },
                Edge::line(b, c),
                Edge {
                    start: c,
                    end: d,
                    curve: z_circle(10.0, 5.0),
                    same_sense: false,
                },
                Edge::line(d, a),
            ],
        };
        let face = Face::new(z_cylinder(5.0), vec![wire], Some(0), true);
        let mesh = tessellate_parametric_face(&face, &fine()).unwrap();
        let expected = PI * 5.0 * 10.0;
        assert!((mesh.area() - expected).abs() < expected * 0.001, "area {}", mesh.area());
        assert!(faces_outward(&mesh));
        // Nothing spills into the -y half.
        assert!(mesh.nodes.iter().all(|p| p.y > -1e-9));
    }

    #[test]
    fn seam_edges_split_the_side_wire() {
        let pieces = without_seams(&side_wire(5.0, 10.0));
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|w| w.edges.len() == 1 && closes(w)));
    }

    #[test]
    fn drilled_cylinder_leaves_the_hole_open() {
        // Cross hole of radius 1 along x, centred on the seam at z = 5.
        let start = Point3::new(5.0, 0.0, 6.0);
        let hole = Wire {
            edges: vec![Edge {
                start,
                end: start,
                curve: Curve::Circle {
                    center: Point3::new(5.0, 0.0, 5.0),
                    x: dir(0., 0., 1.),
                    y: dir(0., 1., 0.),
                    axis: dir(-1., 0., 0.),
                    radius: 1.0,
                },
                same_sense: false,
            }],
        };
        let plain = Face::new(z_cylinder(5.0), vec![side_wire(5.0, 10.0)], Some(0), true);
        let drilled = Face::new(z_cylinder(5.0), vec![side_wire(5.0, 10.0), hole], Some(0), true);

        let full = tessellate_parametric_face(&plain, &fine()).unwrap().area();
        let mesh = tessellate_parametric_face(&drilled, &fine()).unwrap();
        let untrimmed = 2.0 * PI * 5.0 * 10.0;
        assert!((full - untrimmed).abs() < untrimmed * 0.001);
        assert!(mesh.area() < untrimmed - 2.5, "area {}", mesh.area());
        assert!(mesh.area() > untrimmed - 4.0, "area {}", mesh.area());
        assert!(faces_outward(&mesh));
        // No triangle centre falls inside the hole.
        assert!(mesh.corners().all(|[a, b, c]| {
            let mid = (a.coords + b.coords + c.coords) / 3.0;
            mid.y.powi(2) + (mid.z - 5.0).powi(2) > 0.95
        }));
    }

    #[test]
    fn sphere_bounded_by_a_seam_meridian() {
        let r = 3.0;
        let (south, north) = (Point3::new(0., 0., -r), Point3::new(0., 0., r));
        let meridian = Curve::Circle {
            center: Point3::origin(),
            x: dir(1., 0., 0.),
            y: dir(0., 0., 1.),
            axis: dir(0., -1., 0.),
            radius: r,
        };
        let wire = Wire {
            edges: vec![
                Edge {
                    start: south,
                    end: north,
                    curve: meridian.clone(),
                    same_sense: true,
                },
                Edge {
                    start: north,
                    end: south,
                    curve: meridian,
                    same_sense: false,
                },
            ],
        };
        let sphere = Surface::Sphere {
            center: Point3::origin(),
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius: r,
        };
        let face = Face::new(sphere, vec![wire], Some(0), true);
        let mesh = tessellate_parametric_face(&face, &fine()).unwrap();
        let expected = 4.0 / 3.0 * PI * r.powi(3);
        assert!((mesh.signed_volume() - expected).abs() < expected * 0.01);
    }

    #[test]
    fn lune_walks_through_both_poles() {
        let r = 2.0;
        let sphere = Surface::Sphere {
            center: Point3::origin(),
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius: r,
        };
        let meridian = |u: f64| Curve::Circle {
            center: Point3::origin(),
            x: dir(u.cos(), u.sin(), 0.),
            y: dir(0., 0., 1.),
            axis: dir(u.sin(), -u.cos(), 0.),
            radius: r,
        };
        let (south, north) = (Point3::new(0., 0., -r), Point3::new(0., 0., r));
        // Up the meridian at u = 1, down the one at u = 0.
        let wire = Wire {
            edges: vec![
                Edge {
                    start: south,
                    end: north,
                    curve: meridian(1.0),
                    same_sense: true,
                },
                Edge {
                    start: north,
                    end: south,
                    curve: meridian(0.0),
                    same_sense: false,
                },
            ],
        };
        let face = Face::new(sphere, vec![wire], Some(0), true);
        let mesh = tessellate_parametric_face(&face, &fine()).unwrap();
        // A lune of angle 1 covers 2r² of the sphere.
        let expected = 2.0 * r * r;
        assert!((mesh.area() - expected).abs() < expected * 0.01, "area {}", mesh.area());
    }

    #[test]
    fn hemisphere_closes_at_the_pole() {
        let r = 2.0;
        let sphere = Surface::Sphere {
            center: Point3::origin(),
            x: dir(1., 0., 0.),
            y: dir(0., 1., 0.),
            axis: dir(0., 0., 1.),
            radius: r,
        };
        let start = Point3::new(r, 0., 0.);
        let equator = Wire {
            edges: vec![Edge {
                start,
                end: start,
                curve: z_circle(0.0, r),
                same_sense: true,
            }],
        };
        let face = Face::new(sphere, vec![equator], Some(0), true);
        let mesh = tessellate_parametric_face(&face, &fine()).unwrap();
        let expected = 2.0 * PI * r * r;
        assert!((mesh.area() - expected).abs() < expected * 0.01, "area {}", mesh.area());
        // Counter-clockwise seen from above: the upper half.
        assert!(mesh.nodes.iter().all(|p| p.z > -1e-9));
    }

    #[test]
    fn rational_spline_patch_is_a_quarter_cylinder() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let net = [(2., 0.), (2., 2.), (0., 2.)];
        let points = [0.0, 3.0]
            .iter()
            .flat_map(|&z| net.iter().map(move |&(x, y)| Point3::new(x, y, z)))
            .collect();
        let spline = BSplineSurface::new(
            (2, 1),
            (3, 2),
            vec![0., 0., 0., 1., 1., 1.],
            vec![0., 0., 1., 1.],
            points,
        )
        .unwrap()
        .with_weights(vec![1., w, 1., 1., w, 1.])
        .unwrap();
        let face = Face::new(Surface::BSpline(Box::new(spline)), Vec::new(), None, true);
        let mesh = tessellate_parametric_face(&face, &fine()).unwrap();
        let expected = 3.0 * PI;
        assert!((mesh.area() - expected).abs() < expected * 0.01, "area {}", mesh.area());
        assert!(faces_outward(&mesh));
        assert!(mesh.nodes.iter().all(|p| ((p.x * p.x + p.y * p.y).sqrt() - 2.0).abs() < 1e-3));
    }

    #[test]
    fn spline_face_keeps_its_hole_open() {
        let spline = BSplineSurface::new(
            (1, 1),
            (2, 2),
            vec![0., 0., 1., 1.],
            vec![0., 0., 1., 1.],
            vec![
                Point3::new(0., 0., 0.),
                Point3::new(10., 0., 0.),
                Point3::new(0., 10., 0.),
                Point3::new(10., 10., 0.),
            ],
        )
        .unwrap();
        let square = |lo: f64, hi: f64| {
            Wire::polygon(&[
                Point3::new(lo, lo, 0.),
                Point3::new(hi, lo, 0.),
                Point3::new(hi, hi, 0.),
                Point3::new(lo, hi, 0.),
            ])
        };
        let face = Face::new(
            Surface::BSpline(Box::new(spline)),
            vec![square(0.0, 10.0), square(3.0, 7.0)],
            Some(0),
            true,
        );
        let mesh = tessellate_parametric_face(&face, &MeshParams::default()).unwrap();
        assert!((mesh.area() - 84.0).abs() < 1e-6, "area {}", mesh.area());
        assert!(mesh.corners().all(|[a, b, c]| {
            let mid = (a.coords + b.coords + c.coords) / 3.0;
            let outside = !(3.0..=7.0).contains(&mid.x) || !(3.0..=7.0).contains(&mid.y);
            (b - a).cross(&(c - a)).z > 0.0 && outside
        }));
    }

    #[test]
    fn pole_jump_direction() {
        assert!((pole_jump(1.0, 0.0, false) + 1.0).abs() < 1e-12);
        assert!((pole_jump(0.0, 1.0, true) - 1.0).abs() < 1e-12);
        assert_eq!(pole_jump(0.5, 0.5, true), TAU);
        assert_eq!(pole_jump(0.5, 0.5 + TAU, false), -TAU);
    }

    #[test]
    fn open_at_spans_one_period() {
        let ring = [(0.0, 0.0), (2.0, 1.0), (4.0, 0.0)];
        let line = open_at(&ring, 1.0).unwrap();
        assert_eq!(line.first(), Some(&(1.0, 0.5)));
        let last = line[line.len() - 1];
        assert!((last.0 - 1.0 - TAU).abs() < 1e-12 && (last.1 - 0.5).abs() < 1e-12);
        assert!(line.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn seam_cut_avoids_holes() {
        let hole = |lo: f64, hi: f64| UvLoop {
            points: vec![(lo, 0.0), (hi, 0.0), (hi, 1.0)],
            turns: (0, 0),
            outer: false,
        };
        let cut = seam_cut(&[hole(-0.2, 0.2), hole(2.0, 3.0)]).unwrap();
        assert!(cut > 3.0 && cut < TAU - 0.2, "cut {cut}");
        assert_eq!(seam_cut(&[]), Some(0.0));
    }

    #[test]
    fn cylinder_without_boundary_is_unbounded() {
        let face = Face::new(z_cylinder(1.0), Vec::new(), None, true);
        assert!(!is_bounded(&face));
    }

    #[test]
    fn wrap_angle_folds() {
        assert!((wrap_angle(1.5 * TAU).abs() - PI).abs() < 1e-12);
        assert!((wrap_angle(TAU - 0.1) + 0.1).abs() < 1e-12);
        assert!((wrap_angle(-0.2) + 0.2).abs() < 1e-12);
    }
}
