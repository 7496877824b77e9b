//! Rigid-body world: shapes, collision detection, contact resolution and
//! integration.
//!
//! This crate owns the [`World`] and its step pipeline. It builds on
//! [`sim_types`] for plain data and [`sim_contact`] for materials and the
//! impulse solver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Stepper                               │
//! │  Fixed-step accumulator, pending actions, run loops         │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ step(dt)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  forces → broad phase → narrow phase → contact solver       │
//! │         → damping → integration                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ sync_poses
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PoseSink                               │
//! │  Renderer scene objects, maps, closures                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim_core::{BodyDesc, Shape, World, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! // Earth gravity along -Y, 60 Hz
//! let mut world = World::new(SimulationConfig::default()).unwrap();
//!
//! world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
//! let crate_id = world
//!     .add_body(
//!         BodyDesc::dynamic(Shape::cuboid(Vector3::new(0.5, 0.5, 0.5)).unwrap(), 1.0)
//!             .with_position(Point3::new(0.0, 3.0, 0.0))
//!             .with_name("crate"),
//!     )
//!     .unwrap();
//!
//! // Two seconds is plenty to land and settle.
//! for _ in 0..120 {
//!     world.step(world.timestep()).unwrap();
//! }
//!
//! let pose = world.pose(crate_id).unwrap();
//! assert!((pose.position.y - 0.5).abs() < 0.05);
//! ```
//!
//! # Contact Rules
//!
//! Friction and restitution belong to a pair of materials, not to a body:
//!
//! ```
//! use sim_core::{BodyDesc, ContactRule, Shape, World};
//!
//! let mut world = World::default();
//! let ice = world.add_material("ice");
//! let steel = world.add_material("steel");
//! world
//!     .add_contact_material(ice, steel, ContactRule::new(0.02, 0.1).unwrap())
//!     .unwrap();
//!
//! world
//!     .add_body(BodyDesc::fixed(Shape::ground()).with_material(ice))
//!     .unwrap();
//!
//! assert_eq!(world.contact_rule(steel, ice).friction, 0.02);
//! // Pairs without a rule use the default: friction 1, restitution 0.
//! assert_eq!(world.contact_rule(steel, steel), world.default_contact_rule());
//! ```
//!
//! # Diagnostics
//!
//! ```
//! use sim_core::{BodyDesc, Shape, World};
//! use nalgebra::Vector3;
//!
//! let mut world = World::default();
//! world
//!     .add_body(
//!         BodyDesc::dynamic(Shape::sphere(0.5).unwrap(), 2.0)
//!             .with_linear_velocity(Vector3::new(1.0, 0.0, 0.0)),
//!     )
//!     .unwrap();
//!
//! println!("Total kinetic energy: {} J", world.total_kinetic_energy());
//! println!("Total momentum: {:?}", world.total_linear_momentum());
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
)]

pub mod broad_phase;
pub mod integrators;
pub mod narrow_phase;
mod shape;
mod stepper;
mod sync;
mod world;

pub use broad_phase::{
    Aabb, Axis, BroadPhase, BroadPhaseAlgorithm, BroadPhaseConfig, BroadPhaseDetector, BruteForce,
    Proxy, SweepAndPrune,
};
pub use shape::Shape;
pub use stepper::{StepResult, Stepper, StepperConfig};
pub use sync::PoseSink;
pub use world::{Body, BodyDesc, World, WorldSnapshot};

pub use sim_contact::{ContactRule, MaterialId};

// Re-export key types from sim-types for convenience
pub use sim_types::{
    BodyAction, BodyId, ContactInfo, Gravity, MassProperties, Observation, Pose,
    PoseObservation, RigidBodyState, SimError, SimulationConfig, SolverConfig, Twist,
};
