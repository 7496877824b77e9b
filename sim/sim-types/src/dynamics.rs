//! External influences on bodies: gravity and caller-injected actions.

use crate::BodyId;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uniform gravitational acceleration.
///
/// Gravity is mass-independent: every dynamic body receives the same
/// acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity, 9.81 m/s² along -Y (Y up).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, -9.81, 0.0),
        }
    }

    /// Zero gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Gravitational force on a body of the given mass.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }

    /// Whether every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.acceleration.iter().all(|x| x.is_finite())
    }
}

/// An action injected by the caller between steps.
///
/// Forces and torques accumulate and act over the next step only.
/// Impulses change velocity immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyAction {
    /// Force at the center of mass (N), world frame.
    Force {
        /// Target body.
        body: BodyId,
        /// Force vector.
        force: Vector3<f64>,
    },
    /// Torque (N·m), world frame.
    Torque {
        /// Target body.
        body: BodyId,
        /// Torque vector.
        torque: Vector3<f64>,
    },
    /// Linear impulse at the center of mass (N·s), world frame.
    Impulse {
        /// Target body.
        body: BodyId,
        /// Impulse vector.
        impulse: Vector3<f64>,
    },
}

impl BodyAction {
    /// The body this action targets.
    #[must_use]
    pub const fn body(&self) -> BodyId {
        match self {
            Self::Force { body, .. } | Self::Torque { body, .. } | Self::Impulse { body, .. } => {
                *body
            }
        }
    }
}
