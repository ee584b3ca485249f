//! Similarity transforms (rigid motion plus uniform scale).

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion};
use thiserror::Error;

use crate::{Dir3, Point3, Vec3};

/// Errors raised when rebuilding a shape through a transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Scale factor is zero, negative, or not finite.
    #[error("invalid scale factor {0}: must be finite and greater than zero")]
    InvalidScale(f64),
}

/// A rigid motion followed by a uniform, positive scale about the origin:
/// `p ↦ isometry(scale · p)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    isometry: Isometry3<f64>,
    scale: f64,
}

impl Similarity {
    /// The identity map.
    pub fn identity() -> Self {
        Self::uniform_scale(1.0)
    }

    /// Uniform scaling about the origin.
    pub fn uniform_scale(factor: f64) -> Self {
        Self {
            isometry: Isometry3::identity(),
            scale: factor,
        }
    }

    /// Pure translation.
    pub fn translation(offset: Vec3) -> Self {
        Self {
            isometry: Isometry3::translation(offset.x, offset.y, offset.z),
            scale: 1.0,
        }
    }

    /// Compose an isometry with a scale.
    pub fn new(isometry: Isometry3<f64>, scale: f64) -> Self {
        Self { isometry, scale }
    }

    /// Rigid motion taking the world axes onto the right-handed orthonormal
    /// frame `(x, y, z)` at `origin`.
    pub fn from_frame(origin: &Point3, x: &Dir3, y: &Dir3, z: &Dir3) -> Self {
        let basis = [x.into_inner(), y.into_inner(), z.into_inner()];
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_basis_unchecked(&basis));
        Self {
            isometry: Isometry3::from_parts(Translation3::from(origin.coords), rotation),
            scale: 1.0,
        }
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &Similarity) -> Similarity {
        let rotation = self.isometry.rotation * other.isometry.rotation;
        let offset = self.isometry.transform_vector(&(other.isometry.translation.vector * self.scale))
            + self.isometry.translation.vector;
        Similarity {
            isometry: Isometry3::from_parts(Translation3::from(offset), rotation),
            scale: self.scale * other.scale,
        }
    }

    /// The inverse map. Only meaningful for a valid (positive) scale.
    pub fn inverse(&self) -> Similarity {
        let rotation = self.isometry.rotation.inverse();
        let offset = -(rotation * self.isometry.translation.vector) / self.scale;
        Similarity {
            isometry: Isometry3::from_parts(Translation3::from(offset), rotation),
            scale: 1.0 / self.scale,
        }
    }

    /// Whether the map leaves every point in place.
    pub fn is_identity(&self) -> bool {
        (self.scale - 1.0).abs() <= 1e-12
            && self.isometry.translation.vector.norm() <= 1e-12
            && self.isometry.rotation.imag().norm() <= 1e-12
    }

    /// The scale factor.
    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    /// Check the transform is a proper similarity.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.scale.is_finite() && self.scale > 0.0 {
            Ok(())
        } else {
            Err(TransformError::InvalidScale(self.scale))
        }
    }

    /// Map a point.
    pub fn point(&self, p: &Point3) -> Point3 {
        self.isometry.transform_point(&Point3::from(p.coords * self.scale))
    }

    /// Map a direction (rotation only).
    pub fn direction(&self, d: &Dir3) -> Dir3 {
        Dir3::new_normalize(self.isometry.transform_vector(&d.into_inner()))
    }

    /// Map a length.
    pub fn length(&self, l: f64) -> f64 {
        l * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scale_maps_points_about_origin() {
        let sim = Similarity::uniform_scale(0.001);
        let p = sim.point(&Point3::new(1000.0, -250.0, 12.5));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, -0.25, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0125, epsilon = 1e-12);
        assert_relative_eq!(sim.length(40.0), 0.04, epsilon = 1e-12);
    }

    #[test]
    fn directions_are_not_scaled() {
        let sim = Similarity::uniform_scale(1e-3);
        let d = sim.direction(&Dir3::new_normalize(Vec3::new(0.0, 3.0, 4.0)));
        assert_relative_eq!(d.into_inner().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn translation_moves_points() {
        let sim = Similarity::translation(Vec3::new(1.0, 2.0, 3.0));
        let p = sim.point(&Point3::origin());
        assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn frame_compose_and_inverse() {
        let x = Dir3::new_normalize(Vec3::y());
        let y = Dir3::new_normalize(-Vec3::x());
        let z = Dir3::new_normalize(Vec3::z());
        let place = Similarity::from_frame(&Point3::new(10.0, 0.0, 0.0), &x, &y, &z);
        let p = place.point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 1.0, 0.0), epsilon = 1e-12);

        let both = Similarity::uniform_scale(2.0).compose(&place);
        let q = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(both.point(&q), Similarity::uniform_scale(2.0).point(&place.point(&q)), epsilon = 1e-12);
        assert_relative_eq!(both.scale_factor(), 2.0);

        let back = both.inverse().compose(&both);
        assert_relative_eq!(back.point(&q), q, epsilon = 1e-12);
        assert!(back.is_identity());
        assert!(!place.is_identity());
    }

    #[test]
    fn rejects_degenerate_factors() {
        for factor in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(Similarity::uniform_scale(factor).validate().is_err());
        }
        assert!(Similarity::uniform_scale(0.001).validate().is_ok());
    }
}
