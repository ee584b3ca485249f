//! Points, directions, and axis placements.

use stepconv_kernel_brep::{frame, Dir3, Point3, Vec3};

use super::Entities;
use crate::error::StepError;

/// A located coordinate frame from AXIS1_PLACEMENT or AXIS2_PLACEMENT_3D.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Origin, in millimetres.
    pub location: Point3,
    /// Z axis (+Z when unset).
    pub axis: Dir3,
    /// Reference X direction, if given.
    pub ref_direction: Option<Vec3>,
}

impl Placement {
    /// Orthonormal `(x, y, z)` axes of the placement.
    pub fn frame(&self) -> (Dir3, Dir3, Dir3) {
        frame(self.axis, self.ref_direction)
    }
}

impl Entities<'_> {
    /// CARTESIAN_POINT, scaled to millimetres.
    pub fn point(&self, id: u64) -> Result<Point3, StepError> {
        let args = self.instance(id, &["CARTESIAN_POINT"])?;
        let c = args.reals(1)?;
        let s = self.units().length_mm;
        match c.as_slice() {
            [x, y, z, ..] => Ok(Point3::new(x * s, y * s, z * s)),
            [x, y] => Ok(Point3::new(x * s, y * s, 0.0)),
            _ => Err(StepError::geometry(id, "point needs at least 2 coordinates")),
        }
    }

    /// DIRECTION, normalized.
    pub fn direction(&self, id: u64) -> Result<Dir3, StepError> {
        let args = self.instance(id, &["DIRECTION"])?;
        let c = args.reals(1)?;
        let v = match c.as_slice() {
            [x, y, z, ..] => Vec3::new(*x, *y, *z),
            [x, y] => Vec3::new(*x, *y, 0.0),
            _ => return Err(StepError::geometry(id, "direction needs at least 2 components")),
        };
        if v.norm() < 1e-15 {
            return Err(StepError::geometry(id, "zero-length direction"));
        }
        Ok(Dir3::new_normalize(v))
    }

    /// AXIS1_PLACEMENT or AXIS2_PLACEMENT_3D.
    pub fn placement(&self, id: u64) -> Result<Placement, StepError> {
        let args = self.instance(id, &["AXIS2_PLACEMENT_3D", "AXIS1_PLACEMENT"])?;
        let location = self.point(args.entity_ref(1)?)?;
        let axis = match args.optional_ref(2)? {
            Some(axis_id) => self.direction(axis_id)?,
            None => Dir3::new_normalize(Vec3::z()),
        };
        let ref_direction = if args.type_name() == "AXIS2_PLACEMENT_3D" {
            args.optional_ref(3)?
                .map(|ref_id| self.direction(ref_id).map(Dir3::into_inner))
                .transpose()?
        } else {
            None
        };
        Ok(Placement {
            location,
            axis,
            ref_direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::parse_data;
    use approx::assert_relative_eq;

    #[test]
    fn point_uses_length_unit() {
        let file = parse_data(
            "#1 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.CENTI.,.METRE.) );\n\
             #2 = CARTESIAN_POINT('', (1.0, 2.0, 3.0));",
        );
        let p = Entities::new(&file).point(2).unwrap();
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn direction_is_normalized_and_rejects_zero() {
        let file = parse_data("#1 = DIRECTION('', (0., 3., 4.));\n#2 = DIRECTION('', (0., 0., 0.));");
        let entities = Entities::new(&file);
        let d = entities.direction(1).unwrap();
        assert_relative_eq!(d.z, 0.8, epsilon = 1e-12);
        assert!(matches!(
            entities.direction(2),
            Err(StepError::InvalidGeometry { id: 2, .. })
        ));
    }

    #[test]
    fn placement_frame() {
        let file = parse_data(
            "#1 = CARTESIAN_POINT('', (5., 0., 0.));\n\
             #2 = DIRECTION('', (0., 0., 1.));\n\
             #3 = DIRECTION('', (0., 1., 0.));\n\
             #4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);\n\
             #5 = AXIS2_PLACEMENT_3D('', #1, $, $);",
        );
        let entities = Entities::new(&file);
        let (x, y, z) = entities.placement(4).unwrap().frame();
        assert_relative_eq!(x.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(y.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(z.z, 1.0, epsilon = 1e-12);

        let default = entities.placement(5).unwrap();
        assert_relative_eq!(default.axis.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(default.location.x, 5.0, epsilon = 1e-12);
    }
}
