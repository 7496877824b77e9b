//! Explicit time integration of rigid body state.
//!
//! The world advances bodies with semi-implicit (symplectic) Euler: forces
//! update velocities first, contacts and damping adjust those velocities, and
//! the pose is then moved with the final velocity.
//!
//! ```text
//! v(t+dt) = v(t) + (g + F/m) * dt
//! x(t+dt) = x(t) + v(t+dt) * dt
//! q(t+dt) = normalize(q(t) + ½ (0, ω) q(t) dt)
//! ```
//!
//! # Example
//!
//! ```
//! use sim_core::integrators::{apply_forces, integrate_pose};
//! use sim_types::{MassProperties, Pose, RigidBodyState};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 10.0, 0.0)));
//! let mass = MassProperties::sphere(1.0, 0.5);
//! let gravity = Vector3::new(0.0, -9.81, 0.0);
//!
//! apply_forces(&mut state, &mass, &gravity, &Vector3::zeros(), &Vector3::zeros(), 0.01);
//! integrate_pose(&mut state, 0.01);
//!
//! assert!(state.pose.position.y < 10.0);
//! assert!(state.twist.linear.y < 0.0);
//! ```

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use sim_types::{MassProperties, RigidBodyState, Twist};

/// Accumulate gravity and external loads into the velocity.
///
/// Gravity is an acceleration and does not depend on mass. Static bodies are
/// left untouched.
pub fn apply_forces(
    state: &mut RigidBodyState,
    mass: &MassProperties,
    gravity: &Vector3<f64>,
    force: &Vector3<f64>,
    torque: &Vector3<f64>,
    dt: f64,
) {
    if mass.is_static() {
        return;
    }

    state.twist.linear += (gravity + force * mass.inverse_mass()) * dt;

    if torque.iter().any(|t| *t != 0.0) {
        let inv_inertia = mass.world_inverse_inertia(&state.pose.rotation);
        state.twist.angular += inv_inertia * torque * dt;
    }
}

/// Exponential velocity decay.
///
/// `damping` is the fraction of velocity lost per second, so the per-step
/// factor is `(1 - damping)^dt`. A damping of zero leaves the twist exactly
/// unchanged.
#[must_use]
pub fn apply_damping(twist: &Twist, linear_damping: f64, angular_damping: f64, dt: f64) -> Twist {
    let linear_factor = (1.0 - linear_damping).powf(dt);
    let angular_factor = (1.0 - angular_damping).powf(dt);

    Twist::new(twist.linear * linear_factor, twist.angular * angular_factor)
}

/// Clamp speeds to optional maxima, keeping directions.
#[must_use]
pub fn clamp_velocities(twist: &Twist, max_linear: Option<f64>, max_angular: Option<f64>) -> Twist {
    let clamp = |v: Vector3<f64>, limit: Option<f64>| match limit {
        Some(limit) if v.norm() > limit => v.normalize() * limit,
        _ => v,
    };

    Twist::new(
        clamp(twist.linear, max_linear),
        clamp(twist.angular, max_angular),
    )
}

/// First-order quaternion update followed by renormalization.
pub fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    let q = rotation.into_inner();
    let dq = Quaternion::from_imag(*omega) * q * (0.5 * dt);
    *rotation = UnitQuaternion::new_normalize(q + dq);
}

/// Move the pose by the current twist over `dt`.
pub fn integrate_pose(state: &mut RigidBodyState, dt: f64) {
    state.pose.position += state.twist.linear * dt;
    integrate_rotation(&mut state.pose.rotation, &state.twist.angular, dt);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::Pose;

    fn make_state_at_origin() -> RigidBodyState {
        RigidBodyState::at_rest(Pose::from_position(Point3::origin()))
    }

    #[test]
    fn test_semi_implicit_step() {
        let mut state = make_state_at_origin();
        let mass = MassProperties::point_mass(2.0);
        let gravity = Vector3::new(0.0, -9.81, 0.0);

        apply_forces(&mut state, &mass, &gravity, &Vector3::zeros(), &Vector3::zeros(), 1.0);
        integrate_pose(&mut state, 1.0);

        // Velocity updated first to -9.81, then position moved by it.
        assert_relative_eq!(state.twist.linear.y, -9.81, epsilon = 1e-12);
        assert_relative_eq!(state.pose.position.y, -9.81, epsilon = 1e-12);
    }

    #[test]
    fn test_external_force_scales_with_inverse_mass() {
        let mut state = make_state_at_origin();
        let mass = MassProperties::point_mass(4.0);
        let force = Vector3::new(8.0, 0.0, 0.0);

        apply_forces(&mut state, &mass, &Vector3::zeros(), &force, &Vector3::zeros(), 0.5);

        assert_relative_eq!(state.twist.linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_torque_uses_inertia() {
        let mut state = make_state_at_origin();
        let mass = MassProperties::sphere(1.0, 1.0); // I = 0.4
        let torque = Vector3::new(0.0, 0.4, 0.0);

        apply_forces(&mut state, &mass, &Vector3::zeros(), &Vector3::zeros(), &torque, 1.0);

        assert_relative_eq!(state.twist.angular, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_static_body_ignores_forces() {
        let mut state = make_state_at_origin();
        let gravity = Vector3::new(0.0, -9.81, 0.0);
        apply_forces(
            &mut state,
            &MassProperties::fixed(),
            &gravity,
            &Vector3::new(1.0, 2.0, 3.0),
            &Vector3::new(1.0, 0.0, 0.0),
            0.1,
        );
        assert_eq!(state, make_state_at_origin());
    }

    #[test]
    fn test_rotation_integration() {
        let mut rotation = UnitQuaternion::identity();
        let omega = Vector3::new(0.0, 1.0, 0.0);

        // 1000 small steps of 1 ms at 1 rad/s ≈ 1 rad about Y.
        for _ in 0..1000 {
            integrate_rotation(&mut rotation, &omega, 0.001);
        }

        assert_relative_eq!(rotation.angle(), 1.0, epsilon = 1e-3);
        let axis = rotation.axis().unwrap().into_inner();
        assert_relative_eq!(axis, Vector3::y(), epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_stays_unit() {
        let mut rotation = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        let omega = Vector3::new(4.0, -7.0, 2.5);

        for _ in 0..10_000 {
            integrate_rotation(&mut rotation, &omega, 1.0 / 60.0);
        }

        assert_relative_eq!(rotation.into_inner().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_apply_damping() {
        let twist = Twist::new(Vector3::new(10.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 5.0));

        let damped = apply_damping(&twist, 0.5, 0.75, 1.0);
        assert_relative_eq!(damped.linear.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(damped.angular.z, 1.25, epsilon = 1e-12);

        // Two half-steps compound to one full step.
        let half = apply_damping(&apply_damping(&twist, 0.5, 0.75, 0.5), 0.5, 0.75, 0.5);
        assert_relative_eq!(half.linear.x, damped.linear.x, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_damping_is_exact() {
        let twist = Twist::new(Vector3::new(0.1, -3.7, 2.2), Vector3::new(9.0, 0.3, -1.0));
        assert_eq!(apply_damping(&twist, 0.0, 0.0, 1.0 / 60.0), twist);
    }

    #[test]
    fn test_clamp_velocities() {
        let twist = Twist::new(Vector3::new(100.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 50.0));
        let clamped = clamp_velocities(&twist, Some(10.0), Some(5.0));

        assert_relative_eq!(clamped.linear.norm(), 10.0, epsilon = 1e-10);
        assert_relative_eq!(clamped.angular.norm(), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_clamp_velocities_unlimited() {
        let twist = Twist::new(Vector3::new(100.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let clamped = clamp_velocities(&twist, None, Some(10.0));

        assert_eq!(clamped, twist);
    }
}
