//! Simulation world container and entity management.
//!
//! The [`World`] owns every body, the material registry, the pairwise contact
//! rules and the fixed-step pipeline that advances them. Bodies are stored in
//! insertion order, which is also the order in which they are stepped,
//! collided and reported, so a run is reproducible bit-for-bit.

use hashbrown::HashMap;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_contact::{
    ContactManifold, ContactPair, ContactRule, ContactRuleTable, ContactSolver,
    ContactSolverConfig, MaterialId, MaterialRegistry, SolverBody,
};
use sim_types::{
    BodyAction, BodyId, ContactInfo, Gravity, MassProperties, Observation, Pose, PoseObservation,
    RigidBodyState, SimError, SimulationConfig, Twist,
};
use tracing::{debug, trace};

use crate::broad_phase::{BroadPhaseConfig, BroadPhaseDetector, Proxy};
use crate::integrators;
use crate::narrow_phase::{self, RelativeMotion};
use crate::shape::Shape;
use crate::sync::PoseSink;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything needed to create a body.
///
/// ```
/// use sim_core::{BodyDesc, Shape};
/// use nalgebra::{Point3, Vector3};
///
/// let desc = BodyDesc::dynamic(Shape::sphere(2.0).unwrap(), 2.0)
///     .with_position(Point3::new(-4.0, 23.0, 0.0))
///     .with_linear_damping(0.31);
/// assert_eq!(desc.mass, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    /// Collision shape in the body frame.
    pub shape: Shape,
    /// Mass in kg; zero makes the body static.
    pub mass: f64,
    /// Initial pose.
    pub pose: Pose,
    /// Initial velocities.
    pub twist: Twist,
    /// Fraction of linear velocity lost per second, in `[0, 1)`.
    pub linear_damping: f64,
    /// Fraction of angular velocity lost per second, in `[0, 1)`.
    pub angular_damping: f64,
    /// Surface material.
    pub material: MaterialId,
    /// Optional name for debugging.
    pub name: Option<String>,
}

impl BodyDesc {
    /// A movable body of the given mass, at rest at the origin.
    #[must_use]
    pub fn dynamic(shape: Shape, mass: f64) -> Self {
        Self {
            shape,
            mass,
            pose: Pose::identity(),
            twist: Twist::zero(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            material: MaterialId::DEFAULT,
            name: None,
        }
    }

    /// An immovable body.
    #[must_use]
    pub fn fixed(shape: Shape) -> Self {
        Self::dynamic(shape, 0.0)
    }

    /// Set the initial position.
    #[must_use]
    pub fn with_position(mut self, position: Point3<f64>) -> Self {
        self.pose.position = position;
        self
    }

    /// Set the initial orientation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.pose.rotation = rotation;
        self
    }

    /// Set the initial pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.twist.linear = velocity;
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.twist.angular = velocity;
        self
    }

    /// Set both damping coefficients.
    #[must_use]
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set the linear damping coefficient.
    #[must_use]
    pub fn with_linear_damping(mut self, damping: f64) -> Self {
        self.linear_damping = damping;
        self
    }

    /// Set the angular damping coefficient.
    #[must_use]
    pub fn with_angular_damping(mut self, damping: f64) -> Self {
        self.angular_damping = damping;
        self
    }

    /// Set the surface material.
    #[must_use]
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    /// Set a name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn validate(&self) -> sim_types::Result<()> {
        self.shape.validate()?;

        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(SimError::invalid_mass(format!(
                "body mass must be finite and non-negative (got {})",
                self.mass
            )));
        }
        if self.mass > 0.0 && !self.shape.is_bounded() {
            return Err(SimError::invalid_config(
                "a plane has no finite inertia and can only belong to a static body",
            ));
        }

        for (what, damping) in [
            ("linear", self.linear_damping),
            ("angular", self.angular_damping),
        ] {
            if !(0.0..1.0).contains(&damping) {
                return Err(SimError::invalid_config(format!(
                    "{what} damping must be in [0, 1) (got {damping})"
                )));
            }
        }

        if !self.pose.is_finite() || !self.twist.is_finite() {
            return Err(SimError::invalid_config("initial state must be finite"));
        }
        Ok(())
    }
}

/// A rigid body in the simulation world.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    /// Unique identifier.
    pub id: BodyId,
    /// Optional name for debugging.
    pub name: Option<String>,
    /// Collision shape in the body frame.
    pub shape: Shape,
    /// Mass and inertia; mass 0 marks a static body.
    pub mass_props: MassProperties,
    /// Current state (pose + twist).
    pub state: RigidBodyState,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f64,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f64,
    /// Surface material.
    pub material: MaterialId,
    /// Accumulated external force (cleared each step).
    pub accumulated_force: Vector3<f64>,
    /// Accumulated external torque (cleared each step).
    pub accumulated_torque: Vector3<f64>,
}

impl Body {
    fn from_desc(id: BodyId, desc: BodyDesc) -> Self {
        let mass_props = desc.shape.mass_properties(desc.mass);
        let twist = if mass_props.is_static() {
            Twist::zero()
        } else {
            desc.twist
        };
        Self {
            id,
            name: desc.name,
            mass_props,
            shape: desc.shape,
            state: RigidBodyState::new(desc.pose, twist),
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            material: desc.material,
            accumulated_force: Vector3::zeros(),
            accumulated_torque: Vector3::zeros(),
        }
    }

    /// Whether this body never moves.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.mass_props.is_static()
    }

    /// Add a force at the center of mass for the next step.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if !self.is_static() {
            self.accumulated_force += force;
        }
    }

    /// Add a torque for the next step.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.is_static() {
            self.accumulated_torque += torque;
        }
    }

    /// Change the linear velocity immediately by `impulse / mass`.
    pub fn apply_impulse(&mut self, impulse: Vector3<f64>) {
        if !self.is_static() {
            self.state.twist.linear += impulse * self.mass_props.inverse_mass();
        }
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.accumulated_force = Vector3::zeros();
        self.accumulated_torque = Vector3::zeros();
    }

    /// Kinetic energy (translational + rotational).
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_static() {
            return 0.0;
        }
        let inertia = self.mass_props.world_inertia(&self.state.pose.rotation);
        self.state
            .twist
            .kinetic_energy(self.mass_props.mass, &inertia)
    }

    /// Linear momentum.
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        self.state.twist.linear * self.mass_props.mass
    }

    fn proxy(&self) -> Proxy {
        let aabb = self.shape.aabb(&self.state.pose);
        if self.is_static() {
            Proxy::fixed(aabb)
        } else {
            Proxy::dynamic(aabb)
        }
    }

    fn solver_body(&self) -> SolverBody {
        let center = self.state.pose.position;
        if self.is_static() {
            SolverBody::fixed(center)
        } else {
            SolverBody::dynamic(
                center,
                &self.state.twist,
                self.mass_props.inverse_mass(),
                self.mass_props
                    .world_inverse_inertia(&self.state.pose.rotation),
            )
        }
    }
}

/// Body states captured between steps.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldSnapshot {
    /// Simulation time.
    pub time: f64,
    /// Step count.
    pub step: u64,
    /// State of every body, in insertion order.
    pub states: Vec<(BodyId, RigidBodyState)>,
}

/// The simulation world containing all entities.
#[derive(Debug, Clone)]
pub struct World {
    /// Simulation configuration.
    config: SimulationConfig,
    /// Current simulation time.
    time: f64,
    /// Step counter.
    step_count: u64,
    /// All rigid bodies, in insertion order.
    bodies: Vec<Body>,
    /// Body ID to position in `bodies`.
    index: HashMap<BodyId, usize>,
    /// Next available body ID.
    next_body_id: u64,
    /// Known materials.
    materials: MaterialRegistry,
    /// Friction and restitution per material pair.
    rules: ContactRuleTable,
    /// Broad-phase collision detector.
    broad_phase: BroadPhaseDetector,
    /// Contact solver.
    solver: ContactSolver,
    /// Contacts resolved by the last step.
    last_contacts: Vec<ContactInfo>,
}

impl Default for World {
    fn default() -> Self {
        Self::build(SimulationConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    ///
    /// ```
    /// use sim_core::World;
    /// use sim_types::SimulationConfig;
    ///
    /// let world = World::new(SimulationConfig::default()).unwrap();
    /// assert_eq!(world.body_count(), 0);
    /// assert!(World::new(SimulationConfig::with_timestep(-1.0)).is_err());
    /// ```
    pub fn new(config: SimulationConfig) -> sim_types::Result<Self> {
        config.validate()?;
        ContactRule::from(&config.solver).validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimulationConfig) -> Self {
        Self {
            solver: ContactSolver::new(ContactSolverConfig::from(&config.solver)),
            rules: ContactRuleTable::with_default(ContactRule::from(&config.solver)),
            config,
            time: 0.0,
            step_count: 0,
            bodies: Vec::new(),
            index: HashMap::new(),
            next_body_id: 1,
            materials: MaterialRegistry::new(),
            broad_phase: BroadPhaseDetector::default(),
            last_contacts: Vec::new(),
        }
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// The solver settings and the default contact rule follow the new
    /// configuration; registered pair rules are kept.
    pub fn set_config(&mut self, config: SimulationConfig) -> sim_types::Result<()> {
        config.validate()?;
        let fallback = ContactRule::from(&config.solver);
        fallback.validate()?;

        self.solver
            .set_config(ContactSolverConfig::from(&config.solver));
        self.rules.set_fallback(fallback);
        self.config = config;
        Ok(())
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep from configuration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Current gravity.
    #[must_use]
    pub fn gravity(&self) -> Gravity {
        self.config.gravity
    }

    /// Change gravity.
    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.config.gravity = gravity;
    }

    /// Whether `max_time` has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.config.max_time.is_some_and(|max| self.time >= max)
    }

    // =========================================================================
    // Materials and Contact Rules
    // =========================================================================

    /// Register a new material.
    pub fn add_material(&mut self, name: impl Into<String>) -> MaterialId {
        let name = name.into();
        let id = self.materials.add(name.clone());
        debug!(material = %id, %name, "material added");
        id
    }

    /// Name a material was registered under.
    #[must_use]
    pub fn material_name(&self, id: MaterialId) -> Option<&str> {
        self.materials.name(id)
    }

    /// Register the rule used when materials `a` and `b` touch.
    ///
    /// The pair is unordered. A rule already registered for the pair is
    /// replaced and returned.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownMaterial`] if either material was not
    /// created by this world, or [`SimError::InvalidConfig`] if the rule's
    /// coefficients are out of range.
    pub fn add_contact_material(
        &mut self,
        a: MaterialId,
        b: MaterialId,
        rule: ContactRule,
    ) -> sim_types::Result<Option<ContactRule>> {
        self.check_material(a)?;
        self.check_material(b)?;
        rule.validate()?;

        debug!(
            a = %a,
            b = %b,
            friction = rule.friction,
            restitution = rule.restitution,
            "contact rule registered"
        );
        Ok(self.rules.insert(a, b, rule))
    }

    /// Effective rule between two materials.
    #[must_use]
    pub fn contact_rule(&self, a: MaterialId, b: MaterialId) -> ContactRule {
        self.rules.lookup(a, b)
    }

    /// Rule used for material pairs with no registered rule.
    #[must_use]
    pub fn default_contact_rule(&self) -> ContactRule {
        self.rules.fallback()
    }

    /// Replace the rule used for material pairs with no registered rule.
    pub fn set_default_contact_rule(&mut self, rule: ContactRule) -> sim_types::Result<()> {
        rule.validate()?;
        self.rules.set_fallback(rule);
        Ok(())
    }

    fn check_material(&self, id: MaterialId) -> sim_types::Result<()> {
        if self.materials.contains(id) {
            Ok(())
        } else {
            Err(SimError::UnknownMaterial(id.raw()))
        }
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Add a body to the world and return its ID.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidShape`] for degenerate shape parameters
    /// - [`SimError::InvalidMassProperties`] for a negative or non-finite mass
    /// - [`SimError::InvalidConfig`] for damping outside `[0, 1)`, a plane on a
    ///   dynamic body, or a non-finite initial state
    /// - [`SimError::UnknownMaterial`] for a material this world did not create
    pub fn add_body(&mut self, desc: BodyDesc) -> sim_types::Result<BodyId> {
        desc.validate()?;
        self.check_material(desc.material)?;

        let id = BodyId::new(self.next_body_id);
        self.next_body_id += 1;

        let body = Body::from_desc(id, desc);
        body.mass_props.validate()?;

        debug!(
            body = %id,
            shape = body.shape.kind(),
            mass = body.mass_props.mass,
            "body added"
        );
        self.index.insert(id, self.bodies.len());
        self.bodies.push(body);
        Ok(id)
    }

    /// Remove a body from the world.
    ///
    /// Remaining bodies keep their relative order.
    pub fn remove_body(&mut self, id: BodyId) -> sim_types::Result<Body> {
        let position = self
            .index
            .remove(&id)
            .ok_or(SimError::InvalidBodyId(id.raw()))?;
        let body = self.bodies.remove(position);

        for (i, later) in self.bodies.iter().enumerate().skip(position) {
            self.index.insert(later.id, i);
        }
        self.last_contacts.retain(|c| !c.involves_body(id));

        debug!(body = %id, "body removed");
        Ok(body)
    }

    /// Get a body by ID.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    fn body_mut(&mut self, id: BodyId) -> sim_types::Result<&mut Body> {
        let i = *self
            .index
            .get(&id)
            .ok_or(SimError::InvalidBodyId(id.raw()))?;
        Ok(&mut self.bodies[i])
    }

    /// Get a body by name.
    #[must_use]
    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.bodies
            .iter()
            .find(|b| b.name.as_deref() == Some(name))
    }

    /// Iterate over all bodies in insertion order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    /// Iterate over all body IDs in insertion order.
    pub fn body_ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies.iter().map(|b| b.id)
    }

    /// Get the number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Overwrite a body's pose and velocities.
    ///
    /// Static bodies accept a new pose but keep zero velocity.
    pub fn set_state(&mut self, id: BodyId, state: RigidBodyState) -> sim_types::Result<()> {
        if !state.is_finite() {
            return Err(SimError::invalid_config("body state must be finite"));
        }
        let body = self.body_mut(id)?;
        body.state.pose = state.pose;
        if !body.is_static() {
            body.state.twist = state.twist;
        }
        Ok(())
    }

    // =========================================================================
    // External Loads
    // =========================================================================

    /// Add a force at a body's center of mass for the next step.
    pub fn apply_force(&mut self, id: BodyId, force: Vector3<f64>) -> sim_types::Result<()> {
        self.body_mut(id)?.apply_force(force);
        Ok(())
    }

    /// Add a torque to a body for the next step.
    pub fn apply_torque(&mut self, id: BodyId, torque: Vector3<f64>) -> sim_types::Result<()> {
        self.body_mut(id)?.apply_torque(torque);
        Ok(())
    }

    /// Apply a linear impulse at a body's center of mass now.
    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vector3<f64>) -> sim_types::Result<()> {
        self.body_mut(id)?.apply_impulse(impulse);
        Ok(())
    }

    /// Apply a [`BodyAction`].
    pub fn apply_action(&mut self, action: &BodyAction) -> sim_types::Result<()> {
        match *action {
            BodyAction::Force { body, force } => self.apply_force(body, force),
            BodyAction::Torque { body, torque } => self.apply_torque(body, torque),
            BodyAction::Impulse { body, impulse } => self.apply_impulse(body, impulse),
        }
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advance every dynamic body by `dt` seconds.
    ///
    /// Order: forces, broad phase, narrow phase, contact resolution,
    /// damping, velocity limits, integration. Static bodies are never
    /// modified. `dt == 0` does nothing.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidTimestep`] if `dt` is negative or not finite
    /// - [`SimError::Diverged`] if a body state is no longer finite
    pub fn step(&mut self, dt: f64) -> sim_types::Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }

        let gravity = self.config.gravity.acceleration;
        for body in self.bodies.iter_mut().filter(|b| !b.is_static()) {
            integrators::apply_forces(
                &mut body.state,
                &body.mass_props,
                &gravity,
                &body.accumulated_force,
                &body.accumulated_torque,
                dt,
            );
        }

        self.last_contacts = if self.config.enable_contacts {
            self.resolve_contacts(dt)
        } else {
            Vec::new()
        };

        let (max_linear, max_angular) = (
            self.config.max_linear_velocity,
            self.config.max_angular_velocity,
        );
        for body in self.bodies.iter_mut().filter(|b| !b.is_static()) {
            let damped = integrators::apply_damping(
                &body.state.twist,
                body.linear_damping,
                body.angular_damping,
                dt,
            );
            body.state.twist = integrators::clamp_velocities(&damped, max_linear, max_angular);
            integrators::integrate_pose(&mut body.state, dt);
        }

        for body in &mut self.bodies {
            body.clear_forces();
        }
        self.time += dt;
        self.step_count += 1;

        trace!(
            step = self.step_count,
            time = self.time,
            contacts = self.last_contacts.len(),
            "world stepped"
        );

        self.check_finite()
    }

    /// Broad phase, narrow phase and impulse resolution.
    ///
    /// Writes the resolved velocities and positional corrections back into
    /// the dynamic bodies and returns the contacts with their impulses.
    fn resolve_contacts(&mut self, dt: f64) -> Vec<ContactInfo> {
        let proxies: Vec<Proxy> = self.bodies.iter().map(Body::proxy).collect();
        let candidates = self.broad_phase.find_potential_pairs(&proxies);

        let mut manifolds: Vec<(usize, usize, ContactManifold)> = Vec::new();
        for (i, j) in candidates {
            // A static body, if any, always ends up as `body_b`.
            let (ia, ib) = if self.bodies[i].is_static() {
                (j, i)
            } else {
                (i, j)
            };
            let (a, b) = (&self.bodies[ia], &self.bodies[ib]);

            let motion = RelativeMotion::new(a.state.twist, b.state.twist, dt);
            let contacts = narrow_phase::collide_moving(
                &a.shape,
                &a.state.pose,
                &b.shape,
                &b.state.pose,
                &motion,
            );
            if contacts.is_empty() {
                continue;
            }

            let mut manifold = ContactManifold::new(a.id, b.id);
            for contact in contacts {
                manifold.push(contact.point, contact.normal, contact.depth);
            }
            manifolds.push((ia, ib, manifold));
        }

        if manifolds.is_empty() {
            return Vec::new();
        }

        let pairs: Vec<ContactPair<'_>> = manifolds
            .iter()
            .map(|(ia, ib, manifold)| ContactPair {
                index_a: *ia,
                index_b: *ib,
                rule: self
                    .rules
                    .lookup(self.bodies[*ia].material, self.bodies[*ib].material),
                manifold,
            })
            .collect();

        let mut solver_bodies: Vec<SolverBody> = self.bodies.iter().map(Body::solver_body).collect();
        let impulses = self.solver.solve(&mut solver_bodies, &pairs);

        for (body, solved) in self.bodies.iter_mut().zip(&solver_bodies) {
            if body.is_static() {
                continue;
            }
            body.state.twist = Twist::new(solved.linear, solved.angular);
            body.state.pose.position += solved.correction;
        }

        let contacts: Vec<ContactInfo> = manifolds
            .iter()
            .flat_map(|(_, _, manifold)| manifold.points.iter())
            .zip(&impulses)
            .map(|(point, impulse)| point.to_info(impulse.normal, impulse.tangent))
            .collect();

        trace!(
            pairs = manifolds.len(),
            points = contacts.len(),
            "contacts resolved"
        );
        contacts
    }

    fn check_finite(&self) -> sim_types::Result<()> {
        match self.bodies.iter().find(|b| !b.state.is_finite()) {
            Some(body) => Err(SimError::diverged(format!(
                "{} has a non-finite state at t = {}",
                body.id, self.time
            ))),
            None => Ok(()),
        }
    }

    /// Contacts resolved by the last step.
    #[must_use]
    pub fn last_contacts(&self) -> &[ContactInfo] {
        &self.last_contacts
    }

    /// Get the broad-phase configuration.
    #[must_use]
    pub fn broad_phase_config(&self) -> &BroadPhaseConfig {
        self.broad_phase.config()
    }

    /// Update the broad-phase configuration.
    pub fn set_broad_phase_config(&mut self, config: BroadPhaseConfig) {
        self.broad_phase.set_config(config);
    }

    // =========================================================================
    // Observation and Sync
    // =========================================================================

    /// Full state of the world after the last step.
    #[must_use]
    pub fn observe(&self) -> Observation {
        let mut observation = Observation::new(self.time, self.step_count);
        observation.bodies = self.bodies.iter().map(|b| (b.id, b.state)).collect();
        observation.contacts.clone_from(&self.last_contacts);
        observation
    }

    /// Pose of one body.
    #[must_use]
    pub fn pose(&self, id: BodyId) -> Option<Pose> {
        self.body(id).map(|b| b.state.pose)
    }

    /// Pose of every body, in insertion order.
    #[must_use]
    pub fn poses(&self) -> Vec<PoseObservation> {
        self.bodies
            .iter()
            .map(|b| PoseObservation {
                body: b.id,
                pose: b.state.pose,
            })
            .collect()
    }

    /// Push every body's pose into `sink`, in insertion order.
    pub fn sync_poses<S: PoseSink + ?Sized>(&self, sink: &mut S) {
        for body in &self.bodies {
            sink.sync_pose(body.id, &body.state.pose);
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture time, step count and every body state.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            time: self.time,
            step: self.step_count,
            states: self.bodies.iter().map(|b| (b.id, b.state)).collect(),
        }
    }

    /// Write a snapshot back.
    ///
    /// Bodies missing from the snapshot keep their current state. Pending
    /// forces are cleared. Static bodies take the pose only, as with
    /// [`set_state`](Self::set_state).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the snapshot names a body this
    /// world does not have, and [`SimError::InvalidConfig`] if any state is
    /// not finite. The world is left unchanged in both cases.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> sim_types::Result<()> {
        if let Some((missing, _)) = snapshot
            .states
            .iter()
            .find(|(id, _)| !self.index.contains_key(id))
        {
            return Err(SimError::InvalidBodyId(missing.raw()));
        }
        if snapshot.states.iter().any(|(_, state)| !state.is_finite()) {
            return Err(SimError::invalid_config("body state must be finite"));
        }

        for (id, state) in &snapshot.states {
            let body = &mut self.bodies[self.index[id]];
            body.state.pose = state.pose;
            if !body.is_static() {
                body.state.twist = state.twist;
            }
        }
        for body in &mut self.bodies {
            body.clear_forces();
        }
        self.time = snapshot.time;
        self.step_count = snapshot.step;
        self.last_contacts.clear();

        debug!(time = self.time, step = self.step_count, "snapshot restored");
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Compute the total kinetic energy of the system.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    /// Compute the total linear momentum of the system.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.bodies
            .iter()
            .filter(|b| !b.is_static())
            .map(Body::linear_momentum)
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }

    /// Compute the center of mass of the dynamic bodies.
    #[must_use]
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let mut total_mass = 0.0;
        let mut weighted_pos = Vector3::zeros();

        for body in self.bodies.iter().filter(|b| !b.is_static()) {
            let mass = body.mass_props.mass;
            total_mass += mass;
            weighted_pos += body.state.pose.position.coords * mass;
        }

        if total_mass > 0.0 {
            Some(Point3::from(weighted_pos / total_mass))
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::SolverConfig;

    fn ball(radius: f64, mass: f64) -> BodyDesc {
        BodyDesc::dynamic(Shape::sphere(radius).unwrap(), mass)
    }

    #[test]
    fn test_add_and_remove_bodies() {
        let mut world = World::default();
        let a = world.add_body(ball(1.0, 1.0).with_name("a")).unwrap();
        let b = world.add_body(ball(1.0, 1.0).with_name("b")).unwrap();
        let c = world.add_body(ball(1.0, 1.0).with_name("c")).unwrap();
        assert_eq!(world.body_count(), 3);

        let removed = world.remove_body(b).unwrap();
        assert_eq!(removed.id, b);
        assert_eq!(world.body_ids().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(world.body(c).unwrap().name.as_deref(), Some("c"));
        assert!(world.body(b).is_none());
        assert_eq!(world.remove_body(b).unwrap_err(), SimError::InvalidBodyId(b.raw()));

        // IDs are never reused.
        let d = world.add_body(ball(1.0, 1.0)).unwrap();
        assert!(d.raw() > c.raw());
        assert_eq!(world.body_by_name("a").unwrap().id, a);
    }

    #[test]
    fn test_invalid_bodies_rejected() {
        let mut world = World::default();

        let err = world.add_body(ball(1.0, -1.0)).unwrap_err();
        assert!(matches!(err, SimError::InvalidMassProperties { .. }));
        assert!(err.to_string().contains("non-negative"));

        let err = world
            .add_body(BodyDesc::dynamic(Shape::ground(), 1.0))
            .unwrap_err();
        assert!(err.is_config_error());

        let err = world.add_body(ball(1.0, 1.0).with_linear_damping(1.0)).unwrap_err();
        assert!(err.is_config_error());
        let err = world.add_body(ball(1.0, 1.0).with_angular_damping(-0.1)).unwrap_err();
        assert!(err.is_config_error());

        let err = world
            .add_body(ball(1.0, 1.0).with_material(MaterialId(7)))
            .unwrap_err();
        assert_eq!(err, SimError::UnknownMaterial(7));

        let degenerate = BodyDesc::dynamic(Shape::Sphere { radius: 0.0 }, 1.0);
        assert!(matches!(
            world.add_body(degenerate).unwrap_err(),
            SimError::InvalidShape { .. }
        ));

        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_static_plane_allowed() {
        let mut world = World::default();
        let ground = world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        assert!(world.body(ground).unwrap().is_static());
    }

    #[test]
    fn test_contact_rules() {
        let mut world = World::default();
        let ground = world.add_material("ground");
        let ice = world.add_material("ice");
        assert_eq!(world.material_name(ice), Some("ice"));

        assert_eq!(world.contact_rule(ground, ice), ContactRule::default());

        let slick = ContactRule::new(0.05, 0.1).unwrap();
        assert!(world.add_contact_material(ground, ice, slick).unwrap().is_none());
        assert_eq!(world.contact_rule(ice, ground), slick);

        let replaced = world
            .add_contact_material(ice, ground, ContactRule::frictionless())
            .unwrap();
        assert_eq!(replaced, Some(slick));

        let bad = ContactRule::default().with_restitution(2.0);
        assert!(world.add_contact_material(ground, ice, bad).is_err());
        assert_eq!(
            world
                .add_contact_material(ground, MaterialId(42), slick)
                .unwrap_err(),
            SimError::UnknownMaterial(42)
        );
    }

    #[test]
    fn test_default_rule_follows_config() {
        let config =
            SimulationConfig::default().solver(SolverConfig::default().materials(0.3, 0.2));
        let world = World::new(config).unwrap();
        let rule = world.default_contact_rule();
        assert_eq!(rule.friction, 0.3);
        assert_eq!(rule.restitution, 0.2);
    }

    #[test]
    fn test_step_rejects_bad_timestep() {
        let mut world = World::default();
        world.add_body(ball(1.0, 1.0)).unwrap();

        assert_eq!(world.step(-0.01), Err(SimError::InvalidTimestep(-0.01)));
        assert!(world.step(f64::NAN).is_err());
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_zero_timestep_is_noop() {
        let mut world = World::default();
        let id = world
            .add_body(ball(1.0, 1.0).with_linear_velocity(Vector3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let before = *world.body(id).map(|b| &b.state).unwrap();

        world.step(0.0).unwrap();

        assert_eq!(world.body(id).unwrap().state, before);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_forces_cleared_after_step() {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        let id = world.add_body(ball(1.0, 2.0)).unwrap();

        world.apply_force(id, Vector3::new(2.0, 0.0, 0.0)).unwrap();
        world.step(0.5).unwrap();
        // dv = F/m * dt = 0.5
        assert_relative_eq!(world.body(id).unwrap().state.twist.linear.x, 0.5);

        world.step(0.5).unwrap();
        assert_relative_eq!(world.body(id).unwrap().state.twist.linear.x, 0.5);
        assert_eq!(world.body(id).unwrap().accumulated_force, Vector3::zeros());
    }

    #[test]
    fn test_actions() {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        let id = world.add_body(ball(1.0, 4.0)).unwrap();

        world
            .apply_action(&BodyAction::Impulse {
                body: id,
                impulse: Vector3::new(0.0, 8.0, 0.0),
            })
            .unwrap();
        assert_relative_eq!(world.body(id).unwrap().state.twist.linear.y, 2.0);

        let missing = BodyAction::Force {
            body: BodyId::new(99),
            force: Vector3::zeros(),
        };
        assert_eq!(world.apply_action(&missing), Err(SimError::InvalidBodyId(99)));
    }

    #[test]
    fn test_static_bodies_ignore_loads() {
        let mut world = World::default();
        let ground = world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();

        world.apply_impulse(ground, Vector3::new(0.0, 100.0, 0.0)).unwrap();
        world.apply_force(ground, Vector3::new(0.0, 100.0, 0.0)).unwrap();
        world.step(0.1).unwrap();

        assert_eq!(world.body(ground).unwrap().state, RigidBodyState::default());
    }

    #[test]
    fn test_damping_decays_velocity() {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        let id = world
            .add_body(
                ball(1.0, 1.0)
                    .with_linear_velocity(Vector3::new(4.0, 0.0, 0.0))
                    .with_angular_velocity(Vector3::new(0.0, 4.0, 0.0))
                    .with_damping(0.5, 0.75),
            )
            .unwrap();

        world.step(1.0 / 60.0).unwrap();
        let twist = world.body(id).unwrap().state.twist;
        assert_relative_eq!(twist.linear.x, 4.0 * 0.5_f64.powf(1.0 / 60.0), epsilon = 1e-12);
        assert_relative_eq!(twist.angular.y, 4.0 * 0.25_f64.powf(1.0 / 60.0), epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_limits() {
        let config = SimulationConfig::default()
            .zero_gravity()
            .with_velocity_limits(3.0, 1.0);
        let mut world = World::new(config).unwrap();
        let id = world
            .add_body(
                ball(1.0, 1.0)
                    .with_linear_velocity(Vector3::new(30.0, 40.0, 0.0))
                    .with_angular_velocity(Vector3::new(0.0, 0.0, 5.0)),
            )
            .unwrap();

        world.step(0.01).unwrap();
        let twist = world.body(id).unwrap().state.twist;
        assert_relative_eq!(twist.linear, Vector3::new(1.8, 2.4, 0.0), epsilon = 1e-12);
        assert_relative_eq!(twist.angular.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_contacts_disabled() {
        let mut world = World::new(SimulationConfig::default().without_contacts()).unwrap();
        world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        let id = world.add_body(ball(1.0, 1.0).with_position(Point3::new(0.0, 0.5, 0.0))).unwrap();

        world.step(1.0 / 60.0).unwrap();

        assert!(world.last_contacts().is_empty());
        assert!(world.body(id).unwrap().state.twist.linear.y < 0.0);
    }

    #[test]
    fn test_dynamic_body_is_body_a() {
        let mut world = World::default();
        let ground = world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        let id = world
            .add_body(ball(1.0, 1.0).with_position(Point3::new(0.0, 0.9, 0.0)))
            .unwrap();

        world.step(1.0 / 60.0).unwrap();

        let contacts = world.last_contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].body_a, id);
        assert_eq!(contacts[0].body_b, ground);
        assert_relative_eq!(contacts[0].normal, Vector3::y());
        assert!(contacts[0].impulse_normal > 0.0);
    }

    #[test]
    fn test_sphere_sphere_momentum_conserved() {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        world
            .add_body(
                ball(1.0, 1.0)
                    .with_position(Point3::new(-0.95, 0.0, 0.0))
                    .with_linear_velocity(Vector3::new(2.0, 0.0, 0.0)),
            )
            .unwrap();
        world
            .add_body(ball(1.0, 3.0).with_position(Point3::new(0.95, 0.0, 0.0)))
            .unwrap();

        let before = world.total_linear_momentum();
        world.step(1.0 / 60.0).unwrap();
        assert!(!world.last_contacts().is_empty());
        assert_relative_eq!(world.total_linear_momentum(), before, epsilon = 1e-9);
    }

    #[test]
    fn test_observe_and_poses() {
        let mut world = World::default();
        let ground = world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        let id = world
            .add_body(ball(0.5, 1.0).with_position(Point3::new(1.0, 5.0, 2.0)))
            .unwrap();

        world.step(1.0 / 60.0).unwrap();

        let observation = world.observe();
        assert_eq!(observation.step, 1);
        assert_eq!(observation.bodies.len(), 2);
        assert_eq!(observation.bodies[0].0, ground);

        let poses = world.poses();
        assert_eq!(poses[1].body, id);
        assert_eq!(Some(poses[1].pose), world.pose(id));

        let mut seen = Vec::new();
        world.sync_poses(&mut |body: BodyId, pose: &Pose| seen.push((body, pose.position)));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, id);
    }

    #[test]
    fn test_restore_unknown_body() {
        let mut world = World::default();
        let id = world.add_body(ball(1.0, 1.0)).unwrap();
        let mut snapshot = world.snapshot();
        snapshot.states.push((BodyId::new(77), RigidBodyState::default()));

        world.step(0.1).unwrap();
        let state = world.body(id).unwrap().state;

        assert_eq!(world.restore(&snapshot), Err(SimError::InvalidBodyId(77)));
        assert_eq!(world.body(id).unwrap().state, state);
        assert_eq!(world.step_count(), 1);
    }

    #[test]
    fn test_restore_guards_like_set_state() {
        let mut world = World::default();
        let ground = world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        let id = world.add_body(ball(1.0, 1.0)).unwrap();

        let moved = Pose::from_position(Point3::new(0.0, -1.0, 0.0));
        let spin = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0));
        let mut snapshot = world.snapshot();
        snapshot.states[0].1 = RigidBodyState::new(moved, spin);
        world.restore(&snapshot).unwrap();

        let fixed = world.body(ground).unwrap().state;
        assert_eq!(fixed.pose, moved);
        assert_eq!(fixed.twist, Twist::zero());

        let before = world.body(id).unwrap().state;
        snapshot.states[1].1.twist.linear.x = f64::NAN;
        snapshot.step = 9;
        assert!(matches!(
            world.restore(&snapshot),
            Err(SimError::InvalidConfig { .. })
        ));
        assert_eq!(world.body(id).unwrap().state, before);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_diagnostics() {
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        assert!(world.center_of_mass().is_none());

        world.add_body(BodyDesc::fixed(Shape::ground())).unwrap();
        world
            .add_body(
                ball(1.0, 1.0)
                    .with_position(Point3::new(0.0, 2.0, 0.0))
                    .with_linear_velocity(Vector3::new(2.0, 0.0, 0.0)),
            )
            .unwrap();
        world
            .add_body(ball(1.0, 3.0).with_position(Point3::new(4.0, 2.0, 0.0)))
            .unwrap();

        assert_relative_eq!(world.total_kinetic_energy(), 2.0);
        assert_relative_eq!(world.total_linear_momentum(), Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(world.center_of_mass().unwrap(), Point3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn test_max_time() {
        let mut world = World::new(SimulationConfig::default().max_time(0.04)).unwrap();
        assert!(!world.is_complete());
        world.step(1.0 / 60.0).unwrap();
        world.step(1.0 / 60.0).unwrap();
        assert!(!world.is_complete());
        world.step(1.0 / 60.0).unwrap();
        assert!(world.is_complete());
    }

    #[test]
    fn test_set_config_updates_default_rule() {
        let mut world = World::default();
        let config =
            SimulationConfig::default().solver(SolverConfig::default().materials(0.0, 0.5));
        world.set_config(config).unwrap();
        assert_eq!(world.default_contact_rule(), ContactRule::new(0.0, 0.5).unwrap());

        assert!(world.set_config(SimulationConfig::with_timestep(0.0)).is_err());
    }
}
