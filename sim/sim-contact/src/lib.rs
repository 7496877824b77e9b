//! Materials, contact rules and impulse-based contact resolution.
//!
//! This crate sits between collision detection and integration:
//!
//! - [`MaterialRegistry`] and [`ContactRuleTable`] decide how two touching
//!   surfaces behave. Materials are bare identities; friction and
//!   restitution belong to the [`ContactRule`] of an unordered material
//!   pair, with a default rule (friction 1, restitution 0) for pairs that
//!   have none.
//! - [`ContactPoint`] / [`ContactManifold`] carry narrow-phase output.
//! - [`ContactSolver`] turns manifolds into impulses and positional
//!   corrections.
//!
//! # Contact Model
//!
//! For each contact point with normal `n` (from `body_b` toward `body_a`)
//! and pre-contact normal velocity `v_n`:
//!
//! ```text
//! v_n' = -e · v_n        (only while approaching faster than a threshold)
//! |λ_t| ≤ μ · λ_n        (Coulomb cone on accumulated impulses)
//! ```
//!
//! # Example
//!
//! ```
//! use sim_contact::{
//!     ContactManifold, ContactPair, ContactRule, ContactSolver, SolverBody,
//! };
//! use sim_types::{BodyId, Twist};
//! use nalgebra::{Matrix3, Point3, Vector3};
//!
//! // A sphere of mass 1 hitting the ground at 3 m/s.
//! let mut bodies = vec![
//!     SolverBody::fixed(Point3::origin()),
//!     SolverBody::dynamic(
//!         Point3::new(0.0, 0.5, 0.0),
//!         &Twist::linear(Vector3::new(0.0, -3.0, 0.0)),
//!         1.0,
//!         Matrix3::from_diagonal_element(10.0),
//!     ),
//! ];
//!
//! let mut manifold = ContactManifold::new(BodyId::new(1), BodyId::new(0));
//! manifold.push(Point3::origin(), Vector3::y(), 0.001);
//!
//! let pair = ContactPair {
//!     index_a: 1,
//!     index_b: 0,
//!     rule: ContactRule::new(0.5, 0.5).unwrap(),
//!     manifold: &manifold,
//! };
//! ContactSolver::default().solve(&mut bodies, &[pair]);
//!
//! // Half of the approach speed comes back.
//! assert!((bodies[1].linear.y - 1.5).abs() < 1e-9);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod contact;
mod friction;
mod material;
mod solver;

pub use contact::{ContactManifold, ContactPoint};
pub use friction::{FrictionCone, tangent_basis};
pub use material::{ContactRule, ContactRuleTable, MaterialId, MaterialPair, MaterialRegistry};
pub use solver::{ContactImpulse, ContactPair, ContactSolver, ContactSolverConfig, SolverBody};

pub use sim_types::{BodyId, ContactInfo, Pose, RigidBodyState, Twist, Vector3};
