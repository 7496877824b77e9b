//! Unified rigid-body physics API.
//!
//! This crate re-exports the complete stack:
//!
//! - [`sim_types`] - Core data types (bodies, poses, configuration, errors)
//! - [`sim_contact`] - Materials, contact rules and the impulse solver
//! - [`sim_core`] - Shapes, collision detection, the world and the stepper
//!
//! # Quick Start
//!
//! ```
//! use sim_physics::prelude::*;
//!
//! let mut world = World::default();
//! world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
//!
//! let ball = world
//!     .add_body(
//!         BodyDesc::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
//!             .with_position(Point3::new(0.0, 5.0, 0.0)),
//!     )
//!     .unwrap();
//!
//! let mut stepper = Stepper::new();
//! stepper.run_for(&mut world, 1.0).unwrap();
//!
//! let pose = world.pose(ball).unwrap();
//! println!("Final height: {:.2} m", pose.position.y);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      sim-physics (this crate)                   │
//! │                     Unified API / re-exports                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//!                        ┌─────────────────┐
//!                        │    sim-core     │
//!                        │ World, Stepper  │
//!                        │ Shapes, phases  │
//!                        └────────┬────────┘
//!                                 │
//!                                 ▼
//!                        ┌─────────────────┐
//!                        │   sim-contact   │
//!                        │ Rules, solver   │
//!                        └────────┬────────┘
//!                                 │
//!                                 ▼
//!                        ┌─────────────────┐
//!                        │   sim-types     │
//!                        │  Data structs   │
//!                        └─────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/sim-physics/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

// Re-export sub-crates
pub use sim_contact;
pub use sim_core;
pub use sim_types;

// Re-export nalgebra for convenience
pub use nalgebra;

/// Prelude module for convenient imports.
///
/// Import everything you need with a single line:
///
/// ```
/// use sim_physics::prelude::*;
/// ```
pub mod prelude {
    // ========================================================================
    // Core types from sim-types
    // ========================================================================

    // Bodies and motion
    pub use sim_types::{BodyId, MassProperties, Pose, RigidBodyState, Twist};

    // Actions and observations
    pub use sim_types::{BodyAction, ContactInfo, Observation, PoseObservation};

    // Configuration
    pub use sim_types::{Gravity, SimulationConfig, SolverConfig};

    // Errors
    pub use sim_types::SimError;

    // ========================================================================
    // Materials and contact rules from sim-contact
    // ========================================================================

    pub use sim_contact::{ContactRule, ContactRuleTable, MaterialId, MaterialRegistry};

    // ========================================================================
    // World and stepping from sim-core
    // ========================================================================

    pub use sim_core::{
        Body, BodyDesc, PoseSink, Shape, StepResult, Stepper, StepperConfig, World, WorldSnapshot,
    };

    // Broad phase selection
    pub use sim_core::{BroadPhaseAlgorithm, BroadPhaseConfig};

    // ========================================================================
    // Math types from nalgebra
    // ========================================================================

    pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
}
