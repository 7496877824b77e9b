//! Sequential-impulse contact solver with fixed iteration counts.
//!
//! The solver works on velocities. For every contact point it accumulates a
//! normal impulse that drives the approach velocity to the restitution
//! target, and a friction impulse held inside the Coulomb cone. The sweep
//! over all contacts repeats a fixed number of times, so the same inputs
//! always yield the same impulses.
//!
//! After the velocity sweeps, a positional push removes part of each pair's
//! deepest penetration. The push is reported per body and never feeds back
//! into velocity.
//!
//! # Sign Convention
//!
//! Contact normals point from `body_b` toward `body_a`. A positive normal
//! impulse pushes `body_a` along the normal and `body_b` against it.

use nalgebra::{Matrix3, Point3, Vector3};
use sim_types::{SimError, SolverConfig, Twist};
use tracing::trace;

use crate::friction::tangent_basis;
use crate::{ContactManifold, ContactRule, FrictionCone};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the contact solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactSolverConfig {
    /// Number of sweeps over all contacts.
    pub velocity_iterations: usize,

    /// Fraction of the penetration beyond the slop removed per step.
    pub position_correction: f64,

    /// Penetration depth left alone (m).
    ///
    /// Keeps resting contacts slightly overlapping so they are detected
    /// again on the next step instead of flickering.
    pub penetration_slop: f64,

    /// Largest positional push for one pair per step (m).
    pub max_penetration_correction: f64,

    /// Approach speed below which restitution is not applied (m/s).
    ///
    /// Gravity alone adds `g·dt` of approach speed to a resting body every
    /// step. A threshold above that keeps bouncy resting contacts still.
    pub restitution_threshold: f64,
}

impl Default for ContactSolverConfig {
    fn default() -> Self {
        Self::from(&SolverConfig::default())
    }
}

impl From<&SolverConfig> for ContactSolverConfig {
    fn from(config: &SolverConfig) -> Self {
        Self {
            velocity_iterations: config.velocity_iterations,
            position_correction: config.position_correction,
            penetration_slop: config.penetration_slop,
            max_penetration_correction: config.max_penetration_correction,
            restitution_threshold: config.restitution_threshold,
        }
    }
}

impl ContactSolverConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> sim_types::Result<()> {
        if self.velocity_iterations == 0 {
            return Err(SimError::invalid_config(
                "velocity_iterations must be at least 1",
            ));
        }
        if !(self.position_correction > 0.0 && self.position_correction <= 1.0) {
            return Err(SimError::invalid_config(
                "position_correction must be in (0, 1]",
            ));
        }
        if self.penetration_slop < 0.0 {
            return Err(SimError::invalid_config(
                "penetration_slop cannot be negative",
            ));
        }
        if self.max_penetration_correction <= 0.0 {
            return Err(SimError::invalid_config(
                "max_penetration_correction must be positive",
            ));
        }
        if !self.restitution_threshold.is_finite() || self.restitution_threshold < 0.0 {
            return Err(SimError::invalid_config(
                "restitution_threshold must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Per-body data the solver reads and writes.
///
/// Static bodies have zero inverse mass and inertia and are never changed by
/// an impulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Center of mass in world coordinates.
    pub center: Point3<f64>,
    /// Linear velocity.
    pub linear: Vector3<f64>,
    /// Angular velocity.
    pub angular: Vector3<f64>,
    /// Inverse mass.
    pub inv_mass: f64,
    /// Inverse inertia tensor in world coordinates.
    pub inv_inertia: Matrix3<f64>,
    /// Positional push accumulated by penetration correction.
    pub correction: Vector3<f64>,
}

impl SolverBody {
    /// Movable body.
    #[must_use]
    pub fn dynamic(
        center: Point3<f64>,
        twist: &Twist,
        inv_mass: f64,
        inv_inertia: Matrix3<f64>,
    ) -> Self {
        Self {
            center,
            linear: twist.linear,
            angular: twist.angular,
            inv_mass,
            inv_inertia,
            correction: Vector3::zeros(),
        }
    }

    /// Immovable body.
    #[must_use]
    pub fn fixed(center: Point3<f64>) -> Self {
        Self {
            center,
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            inv_mass: 0.0,
            inv_inertia: Matrix3::zeros(),
            correction: Vector3::zeros(),
        }
    }

    /// Whether impulses leave this body unchanged.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0 && self.inv_inertia == Matrix3::zeros()
    }

    /// Velocity of the material point at offset `r` from the center.
    #[must_use]
    pub fn velocity_at(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(r)
    }

    /// Apply an impulse at offset `r` from the center.
    pub fn apply_impulse(&mut self, impulse: &Vector3<f64>, r: &Vector3<f64>) {
        self.linear += impulse * self.inv_mass;
        self.angular += self.inv_inertia * r.cross(impulse);
    }

    /// `1 / k` along `direction`, where `k` is this body's share of the
    /// inverse effective mass at offset `r`.
    fn inverse_mass_along(&self, r: &Vector3<f64>, direction: &Vector3<f64>) -> f64 {
        let rn = r.cross(direction);
        self.inv_mass + direction.dot(&(self.inv_inertia * rn).cross(r))
    }
}

/// A manifold handed to the solver together with its body slots and rule.
#[derive(Debug, Clone, Copy)]
pub struct ContactPair<'a> {
    /// Index of `manifold.body_a` in the solver's body slice.
    pub index_a: usize,
    /// Index of `manifold.body_b` in the solver's body slice.
    pub index_b: usize,
    /// Friction and restitution for this pair.
    pub rule: ContactRule,
    /// The contact points.
    pub manifold: &'a ContactManifold,
}

/// Accumulated impulse of one contact point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactImpulse {
    /// Normal impulse, never negative.
    pub normal: f64,
    /// Friction impulse in the tangent plane.
    pub tangent: Vector3<f64>,
}

#[derive(Debug, Clone, Copy)]
struct PointConstraint {
    index_a: usize,
    index_b: usize,
    ra: Vector3<f64>,
    rb: Vector3<f64>,
    normal: Vector3<f64>,
    tangents: [Vector3<f64>; 2],
    normal_mass: f64,
    tangent_mass: [f64; 2],
    target_velocity: f64,
    cone: FrictionCone,
    impulse: ContactImpulse,
}

/// Contact solver.
#[derive(Debug, Clone, Default)]
pub struct ContactSolver {
    config: ContactSolverConfig,
}

impl ContactSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub fn new(config: ContactSolverConfig) -> Self {
        Self { config }
    }

    /// Solver configuration.
    #[must_use]
    pub fn config(&self) -> &ContactSolverConfig {
        &self.config
    }

    /// Replace the solver configuration.
    pub fn set_config(&mut self, config: ContactSolverConfig) {
        self.config = config;
    }

    /// Resolve all contacts.
    ///
    /// Updates velocities and `correction` of `bodies` in place and returns
    /// one [`ContactImpulse`] per contact point, in manifold order.
    ///
    /// # Panics
    ///
    /// Panics if a pair's body index is out of bounds for `bodies`.
    pub fn solve(&self, bodies: &mut [SolverBody], pairs: &[ContactPair<'_>]) -> Vec<ContactImpulse> {
        let mut constraints: Vec<PointConstraint> = pairs
            .iter()
            .flat_map(|pair| {
                pair.manifold
                    .points
                    .iter()
                    .map(move |point| (pair, point))
            })
            .map(|(pair, point)| self.prepare(bodies, pair, &point.position, &point.normal))
            .collect();

        for _ in 0..self.config.velocity_iterations {
            for constraint in &mut constraints {
                if constraint.index_a == constraint.index_b {
                    continue;
                }
                Self::solve_normal(bodies, constraint);
                Self::solve_friction(bodies, constraint);
            }
        }

        for pair in pairs {
            self.correct_position(bodies, pair);
        }

        trace!(
            pairs = pairs.len(),
            points = constraints.len(),
            iterations = self.config.velocity_iterations,
            "contacts resolved"
        );

        constraints.iter().map(|c| c.impulse).collect()
    }

    fn prepare(
        &self,
        bodies: &[SolverBody],
        pair: &ContactPair<'_>,
        position: &Point3<f64>,
        normal: &Vector3<f64>,
    ) -> PointConstraint {
        let a = &bodies[pair.index_a];
        let b = &bodies[pair.index_b];
        let ra = position - a.center;
        let rb = position - b.center;
        let tangents = {
            let (t1, t2) = tangent_basis(normal);
            [t1, t2]
        };

        let effective_mass = |direction: &Vector3<f64>| {
            let k = a.inverse_mass_along(&ra, direction) + b.inverse_mass_along(&rb, direction);
            if k > 1e-12 { 1.0 / k } else { 0.0 }
        };

        let approach = (a.velocity_at(&ra) - b.velocity_at(&rb)).dot(normal);
        let target_velocity = if -approach > self.config.restitution_threshold {
            -pair.rule.restitution * approach
        } else {
            0.0
        };

        PointConstraint {
            index_a: pair.index_a,
            index_b: pair.index_b,
            ra,
            rb,
            normal: *normal,
            tangents,
            normal_mass: effective_mass(normal),
            tangent_mass: [effective_mass(&tangents[0]), effective_mass(&tangents[1])],
            target_velocity,
            cone: FrictionCone::new(pair.rule.friction),
            impulse: ContactImpulse::default(),
        }
    }

    fn relative_velocity(bodies: &[SolverBody], c: &PointConstraint) -> Vector3<f64> {
        bodies[c.index_a].velocity_at(&c.ra) - bodies[c.index_b].velocity_at(&c.rb)
    }

    fn apply(bodies: &mut [SolverBody], c: &PointConstraint, impulse: &Vector3<f64>) {
        bodies[c.index_a].apply_impulse(impulse, &c.ra);
        bodies[c.index_b].apply_impulse(&-impulse, &c.rb);
    }

    fn solve_normal(bodies: &mut [SolverBody], c: &mut PointConstraint) {
        let vn = Self::relative_velocity(bodies, c).dot(&c.normal);
        let lambda = c.normal_mass * (c.target_velocity - vn);

        let previous = c.impulse.normal;
        c.impulse.normal = (previous + lambda).max(0.0);
        let delta = c.impulse.normal - previous;

        Self::apply(bodies, c, &(c.normal * delta));
    }

    fn solve_friction(bodies: &mut [SolverBody], c: &mut PointConstraint) {
        if c.cone.mu <= 0.0 {
            return;
        }

        let v = Self::relative_velocity(bodies, c);
        let [t1, t2] = c.tangents;
        let lambda = -(t1 * (v.dot(&t1) * c.tangent_mass[0]) + t2 * (v.dot(&t2) * c.tangent_mass[1]));

        let previous = c.impulse.tangent;
        c.impulse.tangent = c.cone.project(previous + lambda, c.impulse.normal);
        let delta = c.impulse.tangent - previous;

        Self::apply(bodies, c, &delta);
    }

    fn correct_position(&self, bodies: &mut [SolverBody], pair: &ContactPair<'_>) {
        let Some(deepest) = pair.manifold.deepest() else {
            return;
        };

        let inv_a = bodies[pair.index_a].inv_mass;
        let inv_b = bodies[pair.index_b].inv_mass;
        let total = inv_a + inv_b;
        if total <= 0.0 || pair.index_a == pair.index_b {
            return;
        }

        let excess = (deepest.penetration - self.config.penetration_slop).max(0.0);
        let push = (excess * self.config.position_correction)
            .min(self.config.max_penetration_correction);
        if push <= 0.0 {
            return;
        }

        let shift = deepest.normal * push;
        bodies[pair.index_a].correction += shift * (inv_a / total);
        bodies[pair.index_b].correction -= shift * (inv_b / total);
    }
}
