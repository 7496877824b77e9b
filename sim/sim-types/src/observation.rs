//! Observation types: what the world reports after a step.
//!
//! A renderer only needs [`PoseObservation`]s. Tools that analyze a run
//! (tests, replays, plots) use the full [`Observation`] with body states and
//! the contacts resolved during the step.

use crate::{BodyId, Pose, RigidBodyState};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of the world taken right after a step.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Simulation time at which this observation was taken.
    pub time: f64,
    /// Number of steps taken so far.
    pub step: u64,
    /// State of every body, in world insertion order.
    pub bodies: Vec<(BodyId, RigidBodyState)>,
    /// Contacts resolved during the last step.
    pub contacts: Vec<ContactInfo>,
}

impl Observation {
    /// Empty observation at the given time.
    #[must_use]
    pub fn new(time: f64, step: u64) -> Self {
        Self {
            time,
            step,
            bodies: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// State of a specific body.
    #[must_use]
    pub fn body_state(&self, id: BodyId) -> Option<&RigidBodyState> {
        self.bodies
            .iter()
            .find(|(bid, _)| *bid == id)
            .map(|(_, state)| state)
    }

    /// Whether any contact was resolved during the step.
    #[must_use]
    pub fn has_contacts(&self) -> bool {
        !self.contacts.is_empty()
    }

    /// Contacts involving a specific body.
    pub fn contacts_for(&self, id: BodyId) -> impl Iterator<Item = &ContactInfo> {
        self.contacts.iter().filter(move |c| c.involves_body(id))
    }
}

/// One resolved contact point.
///
/// The normal points from `body_b` toward `body_a`. When one of the two
/// bodies is static it is always `body_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactInfo {
    /// First body; dynamic whenever the pair has a dynamic body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Contact point in world coordinates.
    pub position: Point3<f64>,
    /// Unit contact normal, from `body_b` toward `body_a`.
    pub normal: Vector3<f64>,
    /// Penetration depth (positive means overlapping).
    pub depth: f64,
    /// Accumulated normal impulse (N·s).
    pub impulse_normal: f64,
    /// Accumulated tangential (friction) impulse (N·s).
    pub impulse_tangent: Vector3<f64>,
}

impl ContactInfo {
    /// Contact with no impulse applied yet.
    #[must_use]
    pub fn new(
        body_a: BodyId,
        body_b: BodyId,
        position: Point3<f64>,
        normal: Vector3<f64>,
        depth: f64,
    ) -> Self {
        Self {
            body_a,
            body_b,
            position,
            normal,
            depth,
            impulse_normal: 0.0,
            impulse_tangent: Vector3::zeros(),
        }
    }

    /// Set the impulses applied during contact resolution.
    #[must_use]
    pub fn with_impulses(mut self, normal: f64, tangent: Vector3<f64>) -> Self {
        self.impulse_normal = normal;
        self.impulse_tangent = tangent;
        self
    }

    /// Check if this contact involves a specific body.
    #[must_use]
    pub fn involves_body(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// Contact force averaged over a step of length `dt`.
    #[must_use]
    pub fn force(&self, dt: f64) -> Vector3<f64> {
        if dt > 0.0 {
            (self.normal * self.impulse_normal + self.impulse_tangent) / dt
        } else {
            Vector3::zeros()
        }
    }
}

/// Pose of a single body, as consumed by a rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseObservation {
    /// Body ID.
    pub body: BodyId,
    /// Pose at observation time.
    pub pose: Pose,
}

impl PoseObservation {
    /// Create a new pose observation.
    #[must_use]
    pub const fn new(body: BodyId, pose: Pose) -> Self {
        Self { body, pose }
    }
}

/// Aggregated contact statistics for one body over one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactStats {
    /// Number of contacts.
    pub count: usize,
    /// Total normal force magnitude.
    pub total_normal_force: f64,
    /// Total tangential force magnitude.
    pub total_tangent_force: f64,
    /// Deepest penetration among the contacts.
    pub max_depth: f64,
}

impl ContactStats {
    /// Compute statistics from a list of contacts for a specific body.
    #[must_use]
    pub fn for_body(contacts: &[ContactInfo], body: BodyId, dt: f64) -> Self {
        let dt = dt.max(1e-10);
        contacts
            .iter()
            .filter(|c| c.involves_body(body))
            .fold(Self::default(), |mut stats, c| {
                stats.count += 1;
                stats.total_normal_force += c.impulse_normal.abs() / dt;
                stats.total_tangent_force += c.impulse_tangent.norm() / dt;
                stats.max_depth = stats.max_depth.max(c.depth);
                stats
            })
    }

    /// Check if there are any contacts.
    #[must_use]
    pub fn has_contacts(&self) -> bool {
        self.count > 0
    }
}
