//! Core types for the rigid-body world.
//!
//! This crate provides the plain data shared by every other crate in the
//! workspace:
//!
//! - [`RigidBodyState`] - Pose and twist of a rigid body
//! - [`MassProperties`] - Mass and inertia (mass 0 marks a static body)
//! - [`Gravity`] and [`BodyAction`] - External influences
//! - [`SimulationConfig`] / [`SolverConfig`] - Timestep and solver settings
//! - [`Observation`] / [`PoseObservation`] - What a step reports
//! - [`SimError`] - The single error type
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no collision detection and no
//! integration, so a renderer, a replay tool or a test can depend on them
//! without pulling in the solver.
//!
//! # Coordinate System
//!
//! - Right-handed
//! - Y: up (default gravity points along -Y)
//!
//! # Example
//!
//! ```
//! use sim_types::{RigidBodyState, Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(-5.0, 30.0, 0.0)),
//!     Twist::angular(Vector3::new(0.0, 10.0, 0.0)),
//! );
//!
//! assert_eq!(state.pose.position.y, 30.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;
mod observation;

pub use body::{BodyId, MassProperties, Pose, RigidBodyState, Twist};
pub use config::{SimulationConfig, SolverConfig};
pub use dynamics::{BodyAction, Gravity};
pub use error::SimError;
pub use observation::{ContactInfo, ContactStats, Observation, PoseObservation};

pub use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
