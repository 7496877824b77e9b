//! Contact points and manifolds produced by collision detection.

use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, ContactInfo};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point of contact between two bodies.
///
/// The normal is a unit vector pointing from `body_b` toward `body_a`, so
/// pushing `body_a` along it separates the pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Contact position in world coordinates.
    pub position: Point3<f64>,
    /// Unit normal from `body_b` toward `body_a`.
    pub normal: Vector3<f64>,
    /// Penetration depth, strictly positive for a real contact.
    pub penetration: f64,
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
}

impl ContactPoint {
    /// Create a contact point.
    #[must_use]
    pub fn new(
        position: Point3<f64>,
        normal: Vector3<f64>,
        penetration: f64,
        body_a: BodyId,
        body_b: BodyId,
    ) -> Self {
        Self {
            position,
            normal,
            penetration,
            body_a,
            body_b,
        }
    }

    /// Swap the roles of the two bodies, negating the normal.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            position: self.position,
            normal: -self.normal,
            penetration: self.penetration,
            body_a: self.body_b,
            body_b: self.body_a,
        }
    }

    /// Convert to the reported form, with the impulses it received.
    #[must_use]
    pub fn to_info(&self, impulse_normal: f64, impulse_tangent: Vector3<f64>) -> ContactInfo {
        ContactInfo::new(
            self.body_a,
            self.body_b,
            self.position,
            self.normal,
            self.penetration,
        )
        .with_impulses(impulse_normal, impulse_tangent)
    }
}

/// All contact points between one pair of bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactManifold {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Contact points, all sharing the body ordering above.
    pub points: Vec<ContactPoint>,
}

impl ContactManifold {
    /// Empty manifold for a body pair.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            points: Vec::new(),
        }
    }

    /// Add a contact point in this manifold's body order.
    pub fn push(&mut self, position: Point3<f64>, normal: Vector3<f64>, penetration: f64) {
        self.points.push(ContactPoint::new(
            position,
            normal,
            penetration,
            self.body_a,
            self.body_b,
        ));
    }

    /// The point with the largest penetration.
    #[must_use]
    pub fn deepest(&self) -> Option<&ContactPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.penetration.total_cmp(&b.penetration))
    }

    /// Number of contact points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the manifold has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
