//! Configuration types for the world.
//!
//! [`SimulationConfig`] holds the fixed timestep and gravity;
//! [`SolverConfig`] tunes contact resolution and carries the contact rule
//! used when no rule is registered for a pair of materials.

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep used by drivers that step at a constant rate (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Solver configuration.
    pub solver: SolverConfig,
    /// Maximum simulation time (None for unlimited).
    pub max_time: Option<f64>,
    /// Whether collisions are detected and resolved.
    pub enable_contacts: bool,
    /// Speed limit for linear velocity after damping (m/s), off when `None`.
    pub max_linear_velocity: Option<f64>,
    /// Speed limit for angular velocity after damping (rad/s), off when `None`.
    pub max_angular_velocity: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            gravity: Gravity::earth(),
            solver: SolverConfig::default(),
            max_time: None,
            enable_contacts: true,
            max_linear_velocity: None,
            max_angular_velocity: None,
        }
    }
}

impl SimulationConfig {
    /// Default configuration with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// High-fidelity preset (1000 Hz, more solver iterations).
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 1000.0,
            solver: SolverConfig::high_accuracy(),
            ..Default::default()
        }
    }

    /// Fast, low-fidelity preset (30 Hz).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timestep: 1.0 / 30.0,
            solver: SolverConfig::fast(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set the maximum simulation time.
    #[must_use]
    pub fn max_time(mut self, max_time: f64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Disable collision detection and response.
    #[must_use]
    pub fn without_contacts(mut self) -> Self {
        self.enable_contacts = false;
        self
    }

    /// Clamp body speeds after damping.
    #[must_use]
    pub fn with_velocity_limits(mut self, linear: f64, angular: f64) -> Self {
        self.max_linear_velocity = Some(linear);
        self.max_angular_velocity = Some(angular);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if self.timestep > 1.0 {
            return Err(crate::SimError::invalid_config(
                "timestep > 1 second is likely an error",
            ));
        }

        if !self.gravity.is_finite() {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if let Some(max_time) = self.max_time {
            if !max_time.is_finite() || max_time < 0.0 {
                return Err(crate::SimError::invalid_config(
                    "max_time must be finite and non-negative",
                ));
            }
        }

        for limit in [self.max_linear_velocity, self.max_angular_velocity]
            .into_iter()
            .flatten()
        {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(crate::SimError::invalid_config(
                    "velocity limits must be positive and finite",
                ));
            }
        }

        self.solver.validate()
    }

    /// Step frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.timestep
    }
}

/// Configuration for the contact solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Number of sequential-impulse sweeps over all contacts per step.
    pub velocity_iterations: usize,
    /// Fraction of the remaining penetration removed per step, in (0, 1].
    pub position_correction: f64,
    /// Penetration depth left uncorrected, keeping resting contacts alive (m).
    pub penetration_slop: f64,
    /// Largest positional push applied to one contact pair per step (m).
    pub max_penetration_correction: f64,
    /// Approach speed below which restitution is ignored (m/s).
    ///
    /// Zero applies the restitution law to every approaching contact.
    pub restitution_threshold: f64,
    /// Friction used for material pairs without a registered rule.
    pub default_friction: f64,
    /// Restitution used for material pairs without a registered rule.
    pub default_restitution: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            velocity_iterations: 10,
            position_correction: 0.8,
            penetration_slop: 0.005,
            max_penetration_correction: 0.2,
            restitution_threshold: 0.0,
            default_friction: 1.0,
            default_restitution: 0.0,
        }
    }
}

impl SolverConfig {
    /// Restitution threshold that keeps bouncy resting contacts quiet (m/s).
    pub const RESTING_RESTITUTION_THRESHOLD: f64 = 0.5;

    /// More iterations and a tighter slop.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            velocity_iterations: 30,
            penetration_slop: 0.001,
            ..Default::default()
        }
    }

    /// Fewer iterations, a looser slop and no bounce below 0.5 m/s.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            velocity_iterations: 4,
            penetration_slop: 0.01,
            restitution_threshold: Self::RESTING_RESTITUTION_THRESHOLD,
            ..Default::default()
        }
    }

    /// Set the number of velocity iterations.
    #[must_use]
    pub fn iterations(mut self, velocity: usize) -> Self {
        self.velocity_iterations = velocity;
        self
    }

    /// Set the contact rule used for unregistered material pairs.
    #[must_use]
    pub fn materials(mut self, friction: f64, restitution: f64) -> Self {
        self.default_friction = friction;
        self.default_restitution = restitution;
        self
    }

    /// Set the approach speed below which contacts do not bounce.
    ///
    /// [`Self::RESTING_RESTITUTION_THRESHOLD`] silences the small bounce
    /// gravity feeds into bodies resting on bouncy materials.
    #[must_use]
    pub fn restitution_threshold(mut self, speed: f64) -> Self {
        self.restitution_threshold = speed;
        self
    }

    /// Set the position correction fraction and slop.
    #[must_use]
    pub fn position_correction(mut self, fraction: f64, slop: f64) -> Self {
        self.position_correction = fraction;
        self.penetration_slop = slop;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.velocity_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "velocity_iterations must be at least 1",
            ));
        }

        if !(self.position_correction > 0.0 && self.position_correction <= 1.0) {
            return Err(crate::SimError::invalid_config(
                "position_correction must be in (0, 1]",
            ));
        }

        if !self.penetration_slop.is_finite() || self.penetration_slop < 0.0 {
            return Err(crate::SimError::invalid_config(
                "penetration_slop must be finite and non-negative",
            ));
        }

        if !self.max_penetration_correction.is_finite() || self.max_penetration_correction <= 0.0
        {
            return Err(crate::SimError::invalid_config(
                "max_penetration_correction must be positive",
            ));
        }

        if !self.restitution_threshold.is_finite() || self.restitution_threshold < 0.0 {
            return Err(crate::SimError::invalid_config(
                "restitution_threshold must be finite and non-negative",
            ));
        }

        if !self.default_friction.is_finite() || self.default_friction < 0.0 {
            return Err(crate::SimError::invalid_config(
                "friction cannot be negative",
            ));
        }

        if !(0.0..=1.0).contains(&self.default_restitution) {
            return Err(crate::SimError::invalid_config(
                "restitution must be between 0 and 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.timestep, 1.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(config.frequency(), 60.0, epsilon = 1e-9);
        assert!(config.enable_contacts);
    }

    #[test]
    fn test_default_contact_rule() {
        let solver = SolverConfig::default();
        assert_relative_eq!(solver.default_friction, 1.0);
        assert_relative_eq!(solver.default_restitution, 0.0);
    }

    #[test]
    fn test_restitution_threshold() {
        // Every approaching contact bounces unless a threshold is chosen.
        assert_relative_eq!(SolverConfig::default().restitution_threshold, 0.0);
        assert_relative_eq!(
            SolverConfig::fast().restitution_threshold,
            SolverConfig::RESTING_RESTITUTION_THRESHOLD
        );

        let quiet = SolverConfig::default().restitution_threshold(0.5);
        assert!(quiet.validate().is_ok());
        assert!(SolverConfig::default().restitution_threshold(-0.1).validate().is_err());
        assert!(SolverConfig::default().restitution_threshold(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::with_timestep(0.001)
            .zero_gravity()
            .without_contacts()
            .max_time(10.0);

        assert_relative_eq!(config.timestep, 0.001, epsilon = 1e-12);
        assert_relative_eq!(config.gravity.acceleration.norm(), 0.0);
        assert!(!config.enable_contacts);
        assert_eq!(config.max_time, Some(10.0));
    }

    #[test]
    fn test_presets_validate() {
        assert!(SimulationConfig::high_fidelity().validate().is_ok());
        assert!(SimulationConfig::fast().validate().is_ok());
        assert_eq!(SolverConfig::fast().velocity_iterations, 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimulationConfig::default();

        config.timestep = -0.01;
        assert!(config.validate().is_err());

        config.timestep = 0.0;
        assert!(config.validate().is_err());

        config.timestep = f64::NAN;
        assert!(config.validate().is_err());

        config.timestep = 0.01;
        config.max_time = Some(-1.0);
        assert!(config.validate().is_err());

        let limited = SimulationConfig::default().with_velocity_limits(0.0, 10.0);
        assert!(limited.validate().is_err());
        let limited = SimulationConfig::default().with_velocity_limits(50.0, 10.0);
        assert!(limited.validate().is_ok());
    }

    #[test]
    fn test_solver_validation() {
        let mut solver = SolverConfig::default();
        assert!(solver.validate().is_ok());

        solver.velocity_iterations = 0;
        assert!(solver.validate().is_err());

        solver = SolverConfig::default().materials(0.5, 1.5);
        assert!(solver.validate().is_err());

        solver = SolverConfig::default().materials(-0.1, 0.5);
        assert!(solver.validate().is_err());

        solver = SolverConfig::default().position_correction(0.0, 0.01);
        assert!(solver.validate().is_err());
    }
}
