//! Edge geometry.

use stepconv_kernel_brep::{BSplineCurve, Curve};

use super::surfaces::expand_knots;
use super::{Args, Entities};
use crate::error::StepError;

/// Wrappers whose first geometric argument is the 3D curve.
const CURVE_WRAPPERS: &[&str] = &["SURFACE_CURVE", "SEAM_CURVE", "INTERSECTION_CURVE"];
const MAX_WRAPPER_DEPTH: usize = 4;

impl Entities<'_> {
    /// Geometry of an EDGE_CURVE. Curve types the kernel does not model come
    /// back as [`Curve::Unsupported`] so the edge still bounds its face.
    pub fn curve(&self, id: u64) -> Result<Curve, StepError> {
        self.curve_at_depth(id, 0)
    }

    fn curve_at_depth(&self, id: u64, depth: usize) -> Result<Curve, StepError> {
        let entity = self.file().require(id)?;
        let Some(name) = entity.type_name() else {
            if entity.record("B_SPLINE_CURVE_WITH_KNOTS").is_some() {
                return self.bspline_curve(id);
            }
            return Ok(Curve::Unsupported(entity.describe()));
        };
        match name {
            "LINE" | "POLYLINE" => Ok(Curve::Line),
            "B_SPLINE_CURVE_WITH_KNOTS" => self.bspline_curve(id),
            "CIRCLE" => {
                let args = self.instance(id, &["CIRCLE"])?;
                let placement = self.placement(args.entity_ref(1)?)?;
                let (x, y, axis) = placement.frame();
                let radius = args.real(2)? * self.units().length_mm;
                if radius <= 0.0 {
                    return Err(StepError::geometry(id, "circle radius must be positive"));
                }
                Ok(Curve::Circle {
                    center: placement.location,
                    x,
                    y,
                    axis,
                    radius,
                })
            }
            "ELLIPSE" => {
                let args = self.instance(id, &["ELLIPSE"])?;
                let placement = self.placement(args.entity_ref(1)?)?;
                let (x, y, axis) = placement.frame();
                let s = self.units().length_mm;
                let semi_major = args.real(2)? * s;
                let semi_minor = args.real(3)? * s;
                if semi_major <= 0.0 || semi_minor <= 0.0 {
                    return Err(StepError::geometry(id, "ellipse axes must be positive"));
                }
                Ok(Curve::Ellipse {
                    center: placement.location,
                    x,
                    y,
                    axis,
                    semi_major,
                    semi_minor,
                })
            }
            wrapper if CURVE_WRAPPERS.contains(&wrapper) => {
                if depth >= MAX_WRAPPER_DEPTH {
                    return Err(StepError::geometry(id, "curve wrappers nested too deeply"));
                }
                let args = self.instance(id, CURVE_WRAPPERS)?;
                self.curve_at_depth(args.entity_ref(1)?, depth + 1)
            }
            other => Ok(Curve::Unsupported(other.to_string())),
        }
    }

    /// B_SPLINE_CURVE_WITH_KNOTS, simple or inside a complex instance with
    /// B_SPLINE_CURVE and optionally RATIONAL_B_SPLINE_CURVE.
    fn bspline_curve(&self, id: u64) -> Result<Curve, StepError> {
        let entity = self.file().require(id)?;
        let (head, head_at, knots, knots_at, weights) = match entity.type_name() {
            Some(_) => {
                let args = self.instance(id, &["B_SPLINE_CURVE_WITH_KNOTS"])?;
                (args, 1, args, 6, None)
            }
            None => {
                let record = |name: &str| {
                    entity
                        .record(name)
                        .map(|r| Args::new(id, r))
                        .ok_or_else(|| StepError::type_mismatch(id, name, entity.describe()))
                };
                let weights = entity
                    .record("RATIONAL_B_SPLINE_CURVE")
                    .map(|r| Args::new(id, r));
                (
                    record("B_SPLINE_CURVE")?,
                    0,
                    record("B_SPLINE_CURVE_WITH_KNOTS")?,
                    0,
                    weights,
                )
            }
        };
        let degree = head.count(head_at)?;
        let points = head
            .refs(head_at + 1)?
            .into_iter()
            .map(|p| self.point(p))
            .collect::<Result<Vec<_>, _>>()?;
        let knots = expand_knots(&knots, knots_at, knots_at + 1)?;
        let invalid = |e: stepconv_kernel_brep::SplineError| StepError::geometry(id, e.to_string());
        let mut spline = BSplineCurve::new(degree, knots, points).map_err(invalid)?;
        if let Some(weights) = weights {
            spline = spline.with_weights(weights.reals(0)?).map_err(invalid)?;
        }
        Ok(Curve::BSpline(Box::new(spline)))
    }
}
