//! Fixed-step driving of a [`World`].
//!
//! The world only knows how to advance by an exact `dt`. Frame callbacks,
//! on the other hand, arrive at irregular intervals. The [`Stepper`] sits
//! between the two:
//!
//! - [`Stepper::step`] runs exactly one fixed step,
//! - [`Stepper::advance`] banks wall-clock time and runs as many fixed steps
//!   as fit, capped at `max_sub_steps` per call,
//! - [`Stepper::run_for`] runs fixed steps for a span of simulated time.
//!
//! Actions submitted to the stepper are applied right before the next step.
//!
//! # Example
//!
//! ```
//! use sim_core::{BodyDesc, Shape, Stepper, World};
//! use nalgebra::Point3;
//!
//! let mut world = World::default();
//! world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
//! let ball = world
//!     .add_body(
//!         BodyDesc::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
//!             .with_position(Point3::new(0.0, 10.0, 0.0)),
//!     )
//!     .unwrap();
//!
//! let mut stepper = Stepper::new();
//! // A frame callback that arrived 50 ms after the last one.
//! let steps = stepper.advance(&mut world, 0.05).unwrap();
//! assert_eq!(steps, 3);
//! assert!(world.pose(ball).unwrap().position.y < 10.0);
//! ```

use sim_types::{BodyAction, Observation, SimError};
use tracing::debug;

use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of a simulation step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observation after the step.
    pub observation: Observation,
    /// Whether simulation has completed (reached `max_time`).
    pub completed: bool,
}

/// Configuration for the stepper.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Most fixed steps a single [`Stepper::advance`] call may run.
    ///
    /// Time beyond that is dropped so a slow frame cannot snowball into ever
    /// longer catch-up work.
    pub max_sub_steps: usize,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self { max_sub_steps: 8 }
    }
}

impl StepperConfig {
    /// Set the sub-step cap.
    #[must_use]
    pub fn with_max_sub_steps(mut self, max_sub_steps: usize) -> Self {
        self.max_sub_steps = max_sub_steps;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> sim_types::Result<()> {
        if self.max_sub_steps == 0 {
            return Err(SimError::invalid_config("max_sub_steps must be at least 1"));
        }
        Ok(())
    }
}

/// The simulation stepper orchestrates the physics loop.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    /// Stepper configuration.
    config: StepperConfig,
    /// Pending actions to apply.
    pending_actions: Vec<BodyAction>,
    /// Wall-clock time not yet simulated.
    accumulator: f64,
}

impl Stepper {
    /// Create a new stepper with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stepper with custom configuration.
    pub fn with_config(config: StepperConfig) -> sim_types::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Get the stepper configuration.
    #[must_use]
    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Submit an action to be applied on the next step.
    pub fn submit_action(&mut self, action: BodyAction) {
        self.pending_actions.push(action);
    }

    /// Submit multiple actions.
    pub fn submit_actions(&mut self, actions: impl IntoIterator<Item = BodyAction>) {
        self.pending_actions.extend(actions);
    }

    /// Actions waiting for the next step.
    #[must_use]
    pub fn pending_actions(&self) -> &[BodyAction] {
        &self.pending_actions
    }

    /// Clear all pending actions.
    pub fn clear_actions(&mut self) {
        self.pending_actions.clear();
    }

    /// Banked time as a fraction of one step, for blending the last two
    /// poses when rendering.
    #[must_use]
    pub fn interpolation_alpha(&self, world: &World) -> f64 {
        self.accumulator / world.timestep()
    }

    /// Execute one fixed simulation step.
    ///
    /// Pending actions are applied first, in submission order.
    ///
    /// # Errors
    ///
    /// Returns an error if an action names an unknown body or the world
    /// diverges. An unknown body is reported before any action is applied,
    /// and the queue is kept for the caller to fix.
    pub fn step(&mut self, world: &mut World) -> sim_types::Result<StepResult> {
        if let Some(action) = self
            .pending_actions
            .iter()
            .find(|action| world.body(action.body()).is_none())
        {
            return Err(SimError::InvalidBodyId(action.body().raw()));
        }
        for action in self.pending_actions.drain(..) {
            world.apply_action(&action)?;
        }

        world.step(world.timestep())?;

        Ok(StepResult {
            observation: world.observe(),
            completed: world.is_complete(),
        })
    }

    /// Bank `elapsed` seconds of wall-clock time and run the fixed steps that
    /// fit. Returns the number of steps taken.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] for a negative or non-finite
    /// `elapsed`, or any error from [`Stepper::step`].
    pub fn advance(&mut self, world: &mut World, elapsed: f64) -> sim_types::Result<usize> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(SimError::InvalidTimestep(elapsed));
        }

        let dt = world.timestep();
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= dt && steps < self.config.max_sub_steps {
            self.step(world)?;
            self.accumulator -= dt;
            steps += 1;
        }

        if self.accumulator >= dt {
            let kept = self.accumulator % dt;
            debug!(
                dropped = self.accumulator - kept,
                max_sub_steps = self.config.max_sub_steps,
                "frame too slow, dropping simulation time"
            );
            self.accumulator = kept;
        }

        Ok(steps)
    }

    /// Run the simulation until completion or max steps.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails (divergence or invalid action).
    pub fn run(
        &mut self,
        world: &mut World,
        max_steps: Option<u64>,
    ) -> sim_types::Result<Vec<Observation>> {
        let mut observations = Vec::new();

        let mut steps = 0u64;
        loop {
            let result = self.step(world)?;
            observations.push(result.observation);

            if result.completed {
                break;
            }

            steps += 1;
            if max_steps.is_some_and(|max| steps >= max) {
                break;
            }
        }

        Ok(observations)
    }

    /// Run for a span of simulated time, one observation per step.
    ///
    /// # Errors
    ///
    /// Returns an error if `duration` is negative or not finite, or if any
    /// step fails.
    pub fn run_for(
        &mut self,
        world: &mut World,
        duration: f64,
    ) -> sim_types::Result<Vec<Observation>> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::InvalidTimestep(duration));
        }

        let dt = world.timestep();
        let target_time = world.time() + duration;
        // duration and dt are positive, result is bounded
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let estimated_steps = (duration / dt).round() as usize;
        let mut observations = Vec::with_capacity(estimated_steps);

        for _ in 0..estimated_steps {
            // Half a step of slack absorbs round-off in the summed time.
            if world.time() >= target_time - 0.5 * dt {
                break;
            }
            let result = self.step(world)?;
            observations.push(result.observation);

            if result.completed {
                break;
            }
        }

        Ok(observations)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use crate::world::BodyDesc;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use sim_types::{BodyId, SimulationConfig};

    fn world_with_ball() -> (World, BodyId) {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        let id = world
            .add_body(
                BodyDesc::dynamic(Shape::sphere(0.5).unwrap(), 2.0)
                    .with_position(Point3::new(0.0, 10.0, 0.0)),
            )
            .unwrap();
        (world, id)
    }

    #[test]
    fn test_step_applies_pending_actions() {
        let (mut world, id) = world_with_ball();
        let mut stepper = Stepper::new();

        stepper.submit_action(BodyAction::Impulse {
            body: id,
            impulse: Vector3::new(4.0, 0.0, 0.0),
        });
        stepper.submit_action(BodyAction::Force {
            body: id,
            force: Vector3::new(0.0, 120.0, 0.0),
        });
        assert_eq!(stepper.pending_actions().len(), 2);

        let result = stepper.step(&mut world).unwrap();
        assert!(stepper.pending_actions().is_empty());
        assert!(!result.completed);
        assert_eq!(result.observation.step, 1);

        let twist = world.body(id).unwrap().state.twist;
        assert_relative_eq!(twist.linear.x, 2.0, epsilon = 1e-12);
        // F/m * dt = 60 / 60
        assert_relative_eq!(twist.linear.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_action_reported() {
        let (mut world, _) = world_with_ball();
        let mut stepper = Stepper::new();
        stepper.submit_action(BodyAction::Torque {
            body: BodyId::new(404),
            torque: Vector3::zeros(),
        });

        assert_eq!(
            stepper.step(&mut world).unwrap_err(),
            SimError::InvalidBodyId(404)
        );
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_bad_action_applies_nothing() {
        let (mut world, id) = world_with_ball();
        let mut stepper = Stepper::new();
        let good = BodyAction::Impulse {
            body: id,
            impulse: Vector3::new(4.0, 0.0, 0.0),
        };
        let bad = BodyAction::Force {
            body: BodyId::new(404),
            force: Vector3::zeros(),
        };
        stepper.submit_actions([good, bad]);

        assert!(stepper.step(&mut world).is_err());
        // Neither the world nor the queue changed.
        assert_eq!(world.body(id).unwrap().state.twist.linear, Vector3::zeros());
        assert_eq!(stepper.pending_actions(), &[good, bad]);

        stepper.clear_actions();
        stepper.submit_action(good);
        stepper.step(&mut world).unwrap();
        assert_relative_eq!(world.body(id).unwrap().state.twist.linear.x, 2.0);
    }

    #[test]
    fn test_advance_accumulates() {
        let (mut world, _) = world_with_ball();
        let mut stepper = Stepper::new();
        let dt = world.timestep();

        assert_eq!(stepper.advance(&mut world, 0.4 * dt).unwrap(), 0);
        assert_relative_eq!(stepper.interpolation_alpha(&world), 0.4, epsilon = 1e-12);

        assert_eq!(stepper.advance(&mut world, 0.8 * dt).unwrap(), 1);
        assert_relative_eq!(stepper.interpolation_alpha(&world), 0.2, epsilon = 1e-9);
        assert_eq!(world.step_count(), 1);
    }

    #[test]
    fn test_advance_caps_sub_steps() {
        let (mut world, _) = world_with_ball();
        let mut stepper = Stepper::with_config(StepperConfig::default().with_max_sub_steps(4)).unwrap();
        let dt = world.timestep();

        // A 10.5-step hitch runs 4 steps and keeps only the fraction.
        assert_eq!(stepper.advance(&mut world, 10.5 * dt).unwrap(), 4);
        assert!(stepper.interpolation_alpha(&world) < 1.0);
        assert_eq!(world.step_count(), 4);

        assert_eq!(stepper.advance(&mut world, 0.0).unwrap(), 0);
    }

    #[test]
    fn test_advance_rejects_negative_time() {
        let (mut world, _) = world_with_ball();
        let mut stepper = Stepper::new();
        assert!(stepper.advance(&mut world, -1.0).is_err());
        assert!(stepper.advance(&mut world, f64::INFINITY).is_err());
    }

    #[test]
    fn test_run_for_one_second() {
        let (mut world, _) = world_with_ball();
        let mut stepper = Stepper::new();

        let observations = stepper.run_for(&mut world, 1.0).unwrap();
        assert_eq!(observations.len(), 60);
        assert_relative_eq!(world.time(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_run_stops_at_max_time() {
        let mut world = World::new(SimulationConfig::default().max_time(0.1)).unwrap();
        let mut stepper = Stepper::new();

        let observations = stepper.run(&mut world, Some(1000)).unwrap();
        assert!(observations.last().unwrap().time >= 0.1);
        assert!(observations.len() < 10);

        let capped = stepper.run(&mut World::default(), Some(5)).unwrap();
        assert_eq!(capped.len(), 5);
    }

    #[test]
    fn test_zero_sub_steps_rejected() {
        assert!(Stepper::with_config(StepperConfig::default().with_max_sub_steps(0)).is_err());
    }
}
