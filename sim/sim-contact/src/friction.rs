//! Coulomb friction cone.
//!
//! Friction impulses are constrained to a disc in the contact tangent plane:
//!
//! ```text
//! |λ_t| ≤ μ λ_n
//! ```
//!
//! where `λ_n` is the accumulated normal impulse of the same contact point.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coulomb friction cone.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionCone {
    /// Coulomb friction coefficient.
    pub mu: f64,
}

impl FrictionCone {
    /// Cone with the given coefficient (negative values clamp to zero).
    #[must_use]
    pub fn new(mu: f64) -> Self {
        Self { mu: mu.max(0.0) }
    }

    /// Frictionless cone (μ = 0).
    #[must_use]
    pub fn frictionless() -> Self {
        Self { mu: 0.0 }
    }

    /// Project a tangential impulse onto the cone.
    ///
    /// Returns the impulse scaled back onto the disc boundary when it exceeds
    /// `μ · normal_impulse`, and zero when there is no normal impulse to
    /// react against.
    #[must_use]
    pub fn project(&self, tangent_impulse: Vector3<f64>, normal_impulse: f64) -> Vector3<f64> {
        if normal_impulse <= 0.0 || self.mu <= 0.0 {
            return Vector3::zeros();
        }

        let max_friction = self.mu * normal_impulse;
        let magnitude = tangent_impulse.norm();

        if magnitude <= max_friction {
            tangent_impulse
        } else {
            tangent_impulse * (max_friction / magnitude)
        }
    }

    /// Check if a tangential impulse lies inside the cone.
    #[must_use]
    pub fn contains(&self, tangent_impulse: &Vector3<f64>, normal_impulse: f64) -> bool {
        if normal_impulse <= 0.0 {
            return tangent_impulse.norm() < 1e-10;
        }
        tangent_impulse.norm() <= self.mu * normal_impulse + 1e-10
    }

    /// Largest tangential impulse the cone admits.
    #[must_use]
    pub fn max_friction(&self, normal_impulse: f64) -> f64 {
        self.mu * normal_impulse.max(0.0)
    }
}

/// Two unit tangents completing `normal` to a right-handed orthonormal basis.
///
/// The first tangent is built from the world axis least aligned with the
/// normal, so the basis is a pure function of the normal.
#[must_use]
pub fn tangent_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let reference = if normal.x.abs() < 0.57 {
        Vector3::x()
    } else if normal.y.abs() < 0.57 {
        Vector3::y()
    } else {
        Vector3::z()
    };

    let t1 = normal.cross(&reference).normalize();
    let t2 = normal.cross(&t1);
    (t1, t2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inside_cone_unchanged() {
        let cone = FrictionCone::new(0.5);
        let impulse = Vector3::new(0.3, 0.0, 0.1);
        assert_relative_eq!(cone.project(impulse, 1.0), impulse, epsilon = 1e-12);
        assert!(cone.contains(&impulse, 1.0));
    }

    #[test]
    fn test_outside_cone_scaled_to_boundary() {
        let cone = FrictionCone::new(0.5);
        let projected = cone.project(Vector3::new(3.0, 0.0, 4.0), 2.0);
        assert_relative_eq!(projected.norm(), 1.0, epsilon = 1e-12);
        // Direction is preserved.
        assert_relative_eq!(projected.x / projected.z, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_no_normal_impulse_means_no_friction() {
        let cone = FrictionCone::new(2.0);
        assert_relative_eq!(cone.project(Vector3::x(), 0.0).norm(), 0.0);
        assert_relative_eq!(cone.max_friction(-1.0), 0.0);
        assert!(!cone.contains(&Vector3::x(), 0.0));
    }

    #[test]
    fn test_frictionless() {
        let cone = FrictionCone::frictionless();
        assert_relative_eq!(cone.project(Vector3::x(), 10.0).norm(), 0.0);
        assert_relative_eq!(FrictionCone::new(-1.0).mu, 0.0);
    }

    #[test]
    fn test_tangent_basis_orthonormal() {
        for normal in [
            Vector3::y(),
            Vector3::x(),
            -Vector3::z(),
            Vector3::new(1.0, 2.0, -0.5).normalize(),
        ] {
            let (t1, t2) = tangent_basis(&normal);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&normal), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t2.dot(&normal), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = 1e-12);
        }
    }
}
