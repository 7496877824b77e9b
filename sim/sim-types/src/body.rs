//! Rigid body state types.
//!
//! A body's motion state is split into a [`Pose`] (where it is) and a
//! [`Twist`] (how fast it moves). Mass and inertia live in
//! [`MassProperties`], where a mass of zero marks a static body.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a rigid body in the world.
///
/// Ids are handed out by the world in increasing order and never reused,
/// so an id stays valid for the whole lifetime of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position of the body origin (its center of mass) in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose: origin, no rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose at a position with identity rotation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from body-local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Rotate a vector from body-local to world coordinates.
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from world to body-local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Interpolate between two poses, slerping the rotation.
    ///
    /// Useful for rendering between two fixed steps.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            position: Point3::from(self.position.coords.lerp(&other.position.coords, t)),
            rotation: self.rotation.slerp(&other.rotation, t),
        }
    }

    /// Check that the pose holds no `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
///
/// # Example
///
/// ```
/// use sim_types::Twist;
/// use nalgebra::Vector3;
///
/// let twist = Twist::linear(Vector3::new(1.0, 0.0, 0.0));
/// assert_eq!(twist.linear.x, 1.0);
/// assert_eq!(twist.angular.norm(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity of the center of mass (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Twist from linear and angular parts.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Body at rest.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Angular velocity only.
    #[must_use]
    pub fn angular(omega: Vector3<f64>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: omega,
        }
    }

    /// Velocity of a point at `offset` from the center of mass: `v + ω × r`.
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Kinetic energy for a mass and a world-frame inertia tensor.
    #[must_use]
    pub fn kinetic_energy(&self, mass: f64, inertia: &Matrix3<f64>) -> f64 {
        let linear_ke = 0.5 * mass * self.linear.norm_squared();
        let angular_ke = 0.5 * self.angular.dot(&(inertia * self.angular));
        linear_ke + angular_ke
    }

    /// Check that the twist holds no `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }

    /// Magnitude of the linear velocity.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.linear.norm()
    }

    /// Magnitude of the angular velocity.
    #[must_use]
    pub fn angular_speed(&self) -> f64 {
        self.angular.norm()
    }
}

/// Complete motion state of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::{RigidBodyState, Pose};
/// use nalgebra::Point3;
///
/// let state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 30.0, 0.0)));
/// assert_eq!(state.pose.position.y, 30.0);
/// assert!(state.twist.speed() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl RigidBodyState {
    /// State from pose and twist.
    #[must_use]
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// State at rest at the given pose.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::zero(),
        }
    }

    /// Check that the state holds no `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.twist.is_finite()
    }
}

/// Mass and rotational inertia of a rigid body.
///
/// The body origin is its center of mass. A mass of exactly zero marks a
/// static body: infinite effective mass and inertia, never integrated.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg. Zero means static.
    pub mass: f64,
    /// Inertia tensor about the center of mass, body-local frame (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Mass properties with an explicit inertia tensor.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Static (immovable) body.
    #[must_use]
    pub fn fixed() -> Self {
        Self {
            mass: 0.0,
            inertia: Matrix3::zeros(),
        }
    }

    /// Point mass with no rotational inertia.
    #[must_use]
    pub fn point_mass(mass: f64) -> Self {
        Self {
            mass,
            inertia: Matrix3::zeros(),
        }
    }

    /// Uniform solid sphere: I = (2/5) m r².
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal_element(i),
        }
    }

    /// Uniform solid box with the given half extents.
    ///
    /// - Ixx = (1/12) m (y² + z²)
    /// - Iyy = (1/12) m (x² + z²)
    /// - Izz = (1/12) m (x² + y²)
    ///
    /// where x, y, z are full edge lengths.
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            )),
        }
    }

    /// Whether this is a static body.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    /// Inverse mass, zero for static bodies.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static() { 0.0 } else { 1.0 / self.mass }
    }

    /// Inverse of the local inertia tensor.
    ///
    /// Static bodies and bodies with a singular tensor (point masses) get a
    /// zero matrix, which makes them rotationally inert.
    #[must_use]
    pub fn inverse_inertia(&self) -> Matrix3<f64> {
        if self.is_static() {
            return Matrix3::zeros();
        }
        self.inertia.try_inverse().unwrap_or_else(Matrix3::zeros)
    }

    /// Inverse inertia expressed in world coordinates: `R I⁻¹ Rᵀ`.
    #[must_use]
    pub fn world_inverse_inertia(&self, rotation: &UnitQuaternion<f64>) -> Matrix3<f64> {
        let r = rotation.to_rotation_matrix();
        r.matrix() * self.inverse_inertia() * r.matrix().transpose()
    }

    /// Inertia tensor expressed in world coordinates: `R I Rᵀ`.
    #[must_use]
    pub fn world_inertia(&self, rotation: &UnitQuaternion<f64>) -> Matrix3<f64> {
        let r = rotation.to_rotation_matrix();
        r.matrix() * self.inertia * r.matrix().transpose()
    }

    /// Validate that the mass properties are physically meaningful.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() {
            return Err(crate::SimError::invalid_mass("mass must be finite"));
        }

        if self.mass < 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass cannot be negative (got {})",
                self.mass
            )));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be finite",
            ));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e < -1e-10) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive semi-definite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_id() {
        let id = BodyId::new(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(id.to_string(), "Body(7)");
        assert!(BodyId::new(1) < BodyId::new(2));
    }

    #[test]
    fn test_pose_round_trip_point() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.3, -0.1, 1.2),
        );
        let local = Point3::new(0.5, 0.25, -1.0);
        let back = pose.inverse_transform_point(&pose.transform_point(&local));
        assert_relative_eq!(back.coords, local.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_rotation() {
        let pose = Pose::from_position_rotation(
            Point3::origin(),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let world = pose.transform_vector(&Vector3::x());
        assert_relative_eq!(world, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_lerp_clamps() {
        let a = Pose::from_position(Point3::origin());
        let b = Pose::from_position(Point3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(a.lerp(&b, 0.5).position.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(a.lerp(&b, 2.0).position.x, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_twist_velocity_at_point() {
        let twist = Twist::angular(Vector3::z());
        let v = twist.velocity_at_point(&Vector3::x());
        assert_relative_eq!(v, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_twist_kinetic_energy() {
        let twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0));
        let ke = twist.kinetic_energy(2.0, &Matrix3::identity());
        // 0.5 * 2 * 1 + 0.5 * 4
        assert_relative_eq!(ke, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_inertia() {
        let props = MassProperties::sphere(2.0, 2.0);
        assert_relative_eq!(props.inertia[(0, 0)], 3.2, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(2, 2)], 3.2, epsilon = 1e-12);
    }

    #[test]
    fn test_box_inertia() {
        // Unit cube (half extent 0.5), mass 12: I = 12/12 * (1 + 1) = 2
        let props = MassProperties::box_shape(12.0, Vector3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(props.inertia[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(1, 1)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_body_is_inert() {
        let props = MassProperties::fixed();
        assert!(props.is_static());
        assert_eq!(props.inverse_mass(), 0.0);
        assert_eq!(props.inverse_inertia(), Matrix3::zeros());
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_point_mass_has_no_inverse_inertia() {
        let props = MassProperties::point_mass(3.0);
        assert_relative_eq!(props.inverse_mass(), 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(props.inverse_inertia(), Matrix3::zeros());
    }

    #[test]
    fn test_world_inverse_inertia_rotates() {
        let props = MassProperties::box_shape(1.0, Vector3::new(2.0, 0.5, 0.5));
        let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let world = props.world_inverse_inertia(&rotation);
        let local = props.inverse_inertia();
        // A quarter turn about Z swaps the X and Y principal axes.
        assert_relative_eq!(world[(0, 0)], local[(1, 1)], epsilon = 1e-9);
        assert_relative_eq!(world[(1, 1)], local[(0, 0)], epsilon = 1e-9);
    }

    #[test]
    fn test_mass_validation() {
        assert!(MassProperties::sphere(1.0, 1.0).validate().is_ok());

        let negative = MassProperties::sphere(-1.0, 1.0);
        let err = negative.validate().unwrap_err();
        assert!(err.to_string().contains("negative"));

        assert!(MassProperties::point_mass(f64::NAN).validate().is_err());
        assert!(MassProperties::point_mass(f64::INFINITY).validate().is_err());
    }
}
