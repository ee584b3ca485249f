//! Face geometry.

use stepconv_kernel_brep::{BSplineSurface, Point3, Surface};

use super::{Args, Entities};
use crate::error::StepError;

impl Entities<'_> {
    /// Geometry of an ADVANCED_FACE or FACE_SURFACE.
    pub fn surface(&self, id: u64) -> Result<Surface, StepError> {
        let entity = self.file().require(id)?;
        let Some(name) = entity.type_name() else {
            if entity.record("B_SPLINE_SURFACE_WITH_KNOTS").is_some() {
                return self.bspline_surface(id);
            }
            return Ok(Surface::Unsupported(entity.describe()));
        };
        let args = match name {
            "PLANE" | "CYLINDRICAL_SURFACE" | "CONICAL_SURFACE" | "SPHERICAL_SURFACE"
            | "TOROIDAL_SURFACE" => self.instance(id, &[name])?,
            "B_SPLINE_SURFACE_WITH_KNOTS" => return self.bspline_surface(id),
            other => return Ok(Surface::Unsupported(other.to_string())),
        };
        let placement = self.placement(args.entity_ref(1)?)?;
        let (x, y, axis) = placement.frame();
        let origin = placement.location;
        let surface = match name {
            "PLANE" => Surface::Plane {
                origin,
                x,
                y,
                normal: axis,
            },
            "CYLINDRICAL_SURFACE" => Surface::Cylinder {
                origin,
                x,
                y,
                axis,
                radius: self.positive_length(&args, 2)?,
            },
            "CONICAL_SURFACE" => {
                let radius = args.real(2)? * self.units().length_mm;
                if radius < 0.0 {
                    return Err(StepError::geometry(id, "cone radius must not be negative"));
                }
                let semi_angle = args.real(3)? * self.units().angle_rad;
                if !(semi_angle > 0.0 && semi_angle < std::f64::consts::FRAC_PI_2) {
                    return Err(StepError::geometry(id, "cone semi-angle out of range"));
                }
                Surface::Cone {
                    origin,
                    x,
                    y,
                    axis,
                    radius,
                    semi_angle,
                }
            }
            "SPHERICAL_SURFACE" => Surface::Sphere {
                center: origin,
                x,
                y,
                axis,
                radius: self.positive_length(&args, 2)?,
            },
            _ => Surface::Torus {
                center: origin,
                x,
                y,
                axis,
                major_radius: self.positive_length(&args, 2)?,
                minor_radius: self.positive_length(&args, 3)?,
            },
        };
        Ok(surface)
    }

    /// B_SPLINE_SURFACE_WITH_KNOTS, either simple or as part of a complex
    /// instance with B_SPLINE_SURFACE and optionally RATIONAL_B_SPLINE_SURFACE.
    ///
    /// The outer list of the control net runs over `u`.
    fn bspline_surface(&self, id: u64) -> Result<Surface, StepError> {
        let entity = self.file().require(id)?;
        let (net, net_at, knots, knots_at, weights) = match entity.type_name() {
            Some(_) => {
                let args = self.instance(id, &["B_SPLINE_SURFACE_WITH_KNOTS"])?;
                (args, 1, args, 8, None)
            }
            None => {
                let record = |name: &str| {
                    entity
                        .record(name)
                        .map(|r| Args::new(id, r))
                        .ok_or_else(|| StepError::type_mismatch(id, name, entity.describe()))
                };
                let weights = entity
                    .record("RATIONAL_B_SPLINE_SURFACE")
                    .map(|r| Args::new(id, r));
                (
                    record("B_SPLINE_SURFACE")?,
                    0,
                    record("B_SPLINE_SURFACE_WITH_KNOTS")?,
                    0,
                    weights,
                )
            }
        };

        let degrees = (net.count(net_at)?, net.count(net_at + 1)?);
        let grid = net.ref_grid(net_at + 2)?;
        let (n_u, n_v) = (grid.len(), grid.first().map_or(0, Vec::len));
        if grid.iter().any(|row| row.len() != n_v) {
            return Err(StepError::geometry(id, "ragged control net"));
        }
        let mut points = vec![Point3::origin(); n_u * n_v];
        for (i, row) in grid.iter().enumerate() {
            for (j, &point) in row.iter().enumerate() {
                points[j * n_u + i] = self.point(point)?;
            }
        }
        let knots_u = expand_knots(&knots, knots_at, knots_at + 2)?;
        let knots_v = expand_knots(&knots, knots_at + 1, knots_at + 3)?;
        let invalid = |e: stepconv_kernel_brep::SplineError| StepError::geometry(id, e.to_string());
        let mut spline =
            BSplineSurface::new(degrees, (n_u, n_v), knots_u, knots_v, points).map_err(invalid)?;

        if let Some(weights) = weights {
            let rows = weights.real_grid(0)?;
            if rows.len() != n_u || rows.iter().any(|row| row.len() != n_v) {
                return Err(StepError::geometry(id, "weight net does not match control net"));
            }
            let mut flat = vec![0.0; n_u * n_v];
            for (i, row) in rows.iter().enumerate() {
                for (j, &w) in row.iter().enumerate() {
                    flat[j * n_u + i] = w;
                }
            }
            spline = spline.with_weights(flat).map_err(invalid)?;
        }
        Ok(Surface::BSpline(Box::new(spline)))
    }

    fn positive_length(&self, args: &Args<'_>, index: usize) -> Result<f64, StepError> {
        let value = args.real(index)? * self.units().length_mm;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(StepError::geometry(
                args.id(),
                format!("{} radius must be positive", args.type_name()),
            ))
        }
    }
}

/// Knot values repeated by their multiplicities.
pub(super) fn expand_knots(
    args: &Args<'_>,
    mults_at: usize,
    knots_at: usize,
) -> Result<Vec<f64>, StepError> {
    let mults = args.counts(mults_at)?;
    let knots = args.reals(knots_at)?;
    if mults.len() != knots.len() {
        return Err(StepError::geometry(
            args.id(),
            "knot and multiplicity lists differ in length",
        ));
    }
    Ok(knots
        .iter()
        .zip(&mults)
        .flat_map(|(&k, &m)| std::iter::repeat(k).take(m))
        .collect())
}
