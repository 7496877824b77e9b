//! Collision shapes.
//!
//! Shapes are immutable and carry no transform: they are expressed in the
//! local frame of the body that owns them, whose origin is the center of
//! mass.

use nalgebra::{Point3, Vector3};
use sim_types::{MassProperties, Pose, SimError};

use crate::broad_phase::Aabb;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Box centered on the body origin.
    Box {
        /// Half of the edge length along each local axis.
        half_extents: Vector3<f64>,
    },
    /// Sphere centered on the body origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Infinite plane `normal · x = offset` bounding a solid half-space.
    ///
    /// Everything on the side opposite the normal is inside. Only static
    /// bodies may carry a plane.
    Plane {
        /// Unit outward normal.
        normal: Vector3<f64>,
        /// Signed distance of the plane from the body origin along `normal`.
        offset: f64,
    },
}

impl Shape {
    /// Box with the given half extents.
    pub fn cuboid(half_extents: Vector3<f64>) -> sim_types::Result<Self> {
        let shape = Self::Box { half_extents };
        shape.validate()?;
        Ok(shape)
    }

    /// Sphere with the given radius.
    pub fn sphere(radius: f64) -> sim_types::Result<Self> {
        let shape = Self::Sphere { radius };
        shape.validate()?;
        Ok(shape)
    }

    /// Plane with the given normal (normalized here) and offset.
    pub fn plane(normal: Vector3<f64>, offset: f64) -> sim_types::Result<Self> {
        let length = normal.norm();
        if !length.is_finite() || length < 1e-12 {
            return Err(SimError::invalid_shape(
                "plane normal must be finite and non-zero",
            ));
        }
        let shape = Self::Plane {
            normal: normal / length,
            offset,
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Horizontal ground plane through the body origin, facing +Y.
    #[must_use]
    pub fn ground() -> Self {
        Self::Plane {
            normal: Vector3::y(),
            offset: 0.0,
        }
    }

    /// Check that the shape parameters are usable.
    pub fn validate(&self) -> sim_types::Result<()> {
        match self {
            Self::Box { half_extents } => {
                if half_extents.iter().any(|h| !h.is_finite() || *h <= 0.0) {
                    return Err(SimError::invalid_shape(format!(
                        "box half extents must be positive and finite (got {half_extents:?})"
                    )));
                }
            }
            Self::Sphere { radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(SimError::invalid_shape(format!(
                        "sphere radius must be positive and finite (got {radius})"
                    )));
                }
            }
            Self::Plane { normal, offset } => {
                if !normal.iter().all(|x| x.is_finite()) || (normal.norm() - 1.0).abs() > 1e-6 {
                    return Err(SimError::invalid_shape("plane normal must be a unit vector"));
                }
                if !offset.is_finite() {
                    return Err(SimError::invalid_shape("plane offset must be finite"));
                }
            }
        }
        Ok(())
    }

    /// Whether the shape has finite extent.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Self::Plane { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Plane { .. } => "plane",
        }
    }

    /// Mass properties of a uniform solid of this shape.
    ///
    /// A mass of zero, or an unbounded shape, yields a static body.
    #[must_use]
    pub fn mass_properties(&self, mass: f64) -> MassProperties {
        if mass == 0.0 {
            return MassProperties::fixed();
        }
        match self {
            Self::Box { half_extents } => MassProperties::box_shape(mass, *half_extents),
            Self::Sphere { radius } => MassProperties::sphere(mass, *radius),
            Self::Plane { .. } => MassProperties::fixed(),
        }
    }

    /// Radius of the smallest origin-centered sphere enclosing the shape.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Self::Box { half_extents } => half_extents.norm(),
            Self::Sphere { radius } => *radius,
            Self::Plane { .. } => f64::INFINITY,
        }
    }

    /// World-space bounding box of the shape at `pose`.
    ///
    /// Planes bound a half-space: their box is unbounded, except along a
    /// world axis the normal is aligned with, where it stops at the plane.
    #[must_use]
    pub fn aabb(&self, pose: &Pose) -> Aabb {
        match self {
            Self::Sphere { radius } => {
                Aabb::from_center(pose.position, Vector3::repeat(*radius))
            }
            Self::Box { half_extents } => {
                let rotation = pose.rotation.to_rotation_matrix();
                // Half extent of a rotated box along world axis i is sum_j |R_ij| h_j.
                let extent = rotation.matrix().abs() * half_extents;
                Aabb::from_center(pose.position, extent)
            }
            Self::Plane { normal, offset } => {
                let (world_normal, distance) = plane_in_world(normal, *offset, pose);
                let mut min = Point3::from(Vector3::repeat(f64::NEG_INFINITY));
                let mut max = Point3::from(Vector3::repeat(f64::INFINITY));
                for axis in 0..3 {
                    let component = world_normal[axis];
                    if (component.abs() - 1.0).abs() < 1e-12 {
                        // Solid side lies opposite the normal.
                        if component > 0.0 {
                            max[axis] = distance;
                        } else {
                            min[axis] = -distance;
                        }
                    }
                }
                Aabb::new(min, max)
            }
        }
    }
}

/// World-space normal and signed distance from the origin of a plane.
#[must_use]
pub(crate) fn plane_in_world(normal: &Vector3<f64>, offset: f64, pose: &Pose) -> (Vector3<f64>, f64) {
    let world_normal = pose.transform_vector(normal);
    let distance = world_normal.dot(&pose.position.coords) + offset;
    (world_normal, distance)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_degenerate_shapes_rejected() {
        assert!(Shape::sphere(0.0).is_err());
        assert!(Shape::sphere(-1.0).is_err());
        assert!(Shape::sphere(f64::NAN).is_err());
        assert!(Shape::cuboid(Vector3::new(1.0, 0.0, 1.0)).is_err());
        assert!(Shape::cuboid(Vector3::new(1.0, -2.0, 1.0)).is_err());
        assert!(Shape::plane(Vector3::zeros(), 0.0).is_err());
        assert!(Shape::plane(Vector3::y(), f64::INFINITY).is_err());

        let err = Shape::sphere(-1.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidShape { .. }));
    }

    #[test]
    fn test_plane_normal_normalized() {
        let shape = Shape::plane(Vector3::new(0.0, 3.0, 0.0), 1.0).unwrap();
        match shape {
            Shape::Plane { normal, offset } => {
                assert_relative_eq!(normal, Vector3::y());
                assert_eq!(offset, 1.0);
            }
            _ => panic!("expected a plane"),
        }
    }

    #[test]
    fn test_mass_properties() {
        let sphere = Shape::sphere(2.0).unwrap();
        assert_relative_eq!(sphere.mass_properties(2.0).inertia[(0, 0)], 3.2, epsilon = 1e-12);
        assert!(sphere.mass_properties(0.0).is_static());
        assert!(Shape::ground().mass_properties(5.0).is_static());
    }

    #[test]
    fn test_rotated_box_aabb() {
        let shape = Shape::cuboid(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        let pose = Pose::from_position_rotation(
            Point3::new(0.0, 5.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, std::f64::consts::FRAC_PI_4, 0.0),
        );
        let aabb = shape.aabb(&pose);
        let diag = std::f64::consts::SQRT_2;
        assert_relative_eq!(aabb.max.x, diag, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.y, 6.0, epsilon = 1e-12);
        assert_relative_eq!(aabb.min.z, -diag, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_aabb_is_half_space() {
        let pose = Pose::from_position(Point3::new(3.0, -1.0, 0.0));
        let aabb = Shape::ground().aabb(&pose);
        assert_eq!(aabb.max.y, -1.0);
        assert_eq!(aabb.min.y, f64::NEG_INFINITY);
        assert_eq!(aabb.max.x, f64::INFINITY);
    }

    #[test]
    fn test_tilted_plane_aabb_unbounded() {
        let shape = Shape::plane(Vector3::new(1.0, 1.0, 0.0), 0.0).unwrap();
        let aabb = shape.aabb(&Pose::identity());
        assert_eq!(aabb.max.y, f64::INFINITY);
        assert_eq!(aabb.min.x, f64::NEG_INFINITY);
    }

    #[test]
    fn test_bounding_radius() {
        assert_eq!(Shape::sphere(1.5).unwrap().bounding_radius(), 1.5);
        assert_relative_eq!(
            Shape::cuboid(Vector3::new(1.0, 2.0, 2.0)).unwrap().bounding_radius(),
            3.0
        );
        assert!(!Shape::ground().is_bounded());
    }
}
