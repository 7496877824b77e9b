//! Exact contact generation for shape pairs.
//!
//! [`collide`] dispatches over the closed [`Shape`] enum. Every routine
//! reports its contacts with the normal pointing from the *second* shape
//! toward the *first*, and only for strictly positive penetration.
//! [`collide_moving`] takes the shapes' velocities as well; they only move
//! the point of a box–box face contact toward the side that is closing.
//!
//! | Pair          | Method                                                   |
//! |---------------|----------------------------------------------------------|
//! | plane–box     | one contact per box vertex below the plane               |
//! | plane–sphere  | centre distance against radius                           |
//! | sphere–sphere | centre distance against the sum of radii                 |
//! | box–sphere    | closest point on the oriented box                        |
//! | box–box       | separating axis test over 15 axes, one contact point     |

use nalgebra::{Matrix3, Point3, Vector3};
use sim_types::{Pose, Twist};

use crate::shape::{Shape, plane_in_world};

/// Edge-axis overlaps must beat face-axis overlaps by this much to win, so
/// face contacts are not misread as edge contacts through round-off.
const EDGE_AXIS_BIAS: f64 = 1e-9;

/// One contact produced by the narrow phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeometry {
    /// Contact point in world coordinates.
    pub point: Point3<f64>,
    /// Unit normal from the second shape toward the first.
    pub normal: Vector3<f64>,
    /// Penetration depth, always `> 0`.
    pub depth: f64,
}

impl ContactGeometry {
    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Velocities of two shapes over the coming step.
///
/// Box–box face contacts use it to place their single contact point where
/// the faces are closing. [`RelativeMotion::at_rest`] gives the purely
/// geometric answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeMotion {
    /// Velocity of the first shape.
    pub twist_a: Twist,
    /// Velocity of the second shape.
    pub twist_b: Twist,
    /// Length of the coming step (s).
    pub dt: f64,
}

impl RelativeMotion {
    /// Shapes moving with `twist_a` and `twist_b` over a step of `dt`.
    #[must_use]
    pub const fn new(twist_a: Twist, twist_b: Twist, dt: f64) -> Self {
        Self {
            twist_a,
            twist_b,
            dt,
        }
    }

    /// Both shapes at rest.
    #[must_use]
    pub fn at_rest() -> Self {
        Self::new(Twist::zero(), Twist::zero(), 0.0)
    }

    /// Penetration gained at `point` along `normal` (from B toward A) over
    /// the step.
    fn closing_depth(
        &self,
        pose_a: &Pose,
        pose_b: &Pose,
        point: &Point3<f64>,
        normal: &Vector3<f64>,
    ) -> f64 {
        let va = self.twist_a.velocity_at_point(&(point - pose_a.position));
        let vb = self.twist_b.velocity_at_point(&(point - pose_b.position));
        -(va - vb).dot(normal) * self.dt
    }
}

impl Default for RelativeMotion {
    fn default() -> Self {
        Self::at_rest()
    }
}

/// Contacts between shape `a` at `pose_a` and shape `b` at `pose_b`, both at
/// rest.
///
/// # Panics
///
/// Panics for a plane–plane pair. Planes only live on static bodies and the
/// broad phase never pairs two static bodies, so reaching this is a bug in
/// the caller.
#[must_use]
pub fn collide(a: &Shape, pose_a: &Pose, b: &Shape, pose_b: &Pose) -> Vec<ContactGeometry> {
    collide_moving(a, pose_a, b, pose_b, &RelativeMotion::at_rest())
}

/// Contacts between two shapes moving with `motion`.
///
/// Depths and normals are purely geometric; `motion` only moves the
/// representative point of a box–box face contact.
///
/// # Panics
///
/// Panics for a plane–plane pair, like [`collide`].
#[must_use]
pub fn collide_moving(
    a: &Shape,
    pose_a: &Pose,
    b: &Shape,
    pose_b: &Pose,
    motion: &RelativeMotion,
) -> Vec<ContactGeometry> {
    match (a, b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(pose_a, *ra, pose_b, *rb).into_iter().collect()
        }
        (Shape::Sphere { radius }, Shape::Plane { normal, offset }) => {
            sphere_plane(pose_a, *radius, normal, *offset, pose_b)
                .into_iter()
                .collect()
        }
        (Shape::Plane { normal, offset }, Shape::Sphere { radius }) => {
            sphere_plane(pose_b, *radius, normal, *offset, pose_a)
                .into_iter()
                .map(ContactGeometry::flipped)
                .collect()
        }
        (Shape::Box { half_extents }, Shape::Plane { normal, offset }) => {
            box_plane(pose_a, half_extents, normal, *offset, pose_b)
        }
        (Shape::Plane { normal, offset }, Shape::Box { half_extents }) => {
            box_plane(pose_b, half_extents, normal, *offset, pose_a)
                .into_iter()
                .map(ContactGeometry::flipped)
                .collect()
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            sphere_box(pose_a, *radius, pose_b, half_extents)
                .into_iter()
                .collect()
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            sphere_box(pose_b, *radius, pose_a, half_extents)
                .into_iter()
                .map(ContactGeometry::flipped)
                .collect()
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            box_box(pose_a, ha, pose_b, hb, motion).into_iter().collect()
        }
        (Shape::Plane { .. }, Shape::Plane { .. }) => {
            unreachable!("plane-plane pairs are static-static and never reach the narrow phase")
        }
    }
}

// =============================================================================
// Sphere pairs
// =============================================================================

/// Sphere A against sphere B.
#[must_use]
pub fn sphere_sphere(
    pose_a: &Pose,
    radius_a: f64,
    pose_b: &Pose,
    radius_b: f64,
) -> Option<ContactGeometry> {
    let delta = pose_a.position - pose_b.position;
    let distance = delta.norm();
    let depth = radius_a + radius_b - distance;
    if depth <= 0.0 {
        return None;
    }

    // Concentric spheres have no preferred direction; push along +Y.
    let normal = if distance > 1e-12 {
        delta / distance
    } else {
        Vector3::y()
    };

    Some(ContactGeometry {
        point: pose_b.position + normal * (radius_b - 0.5 * depth),
        normal,
        depth,
    })
}

/// Sphere against a plane half-space. The normal is the plane normal.
#[must_use]
pub fn sphere_plane(
    sphere_pose: &Pose,
    radius: f64,
    plane_normal: &Vector3<f64>,
    plane_offset: f64,
    plane_pose: &Pose,
) -> Option<ContactGeometry> {
    let (normal, distance) = plane_in_world(plane_normal, plane_offset, plane_pose);
    let center = sphere_pose.position;
    let depth = radius - (normal.dot(&center.coords) - distance);
    if depth <= 0.0 {
        return None;
    }

    Some(ContactGeometry {
        point: center - normal * radius,
        normal,
        depth,
    })
}

/// Sphere against an oriented box. The normal points from the box toward
/// the sphere.
#[must_use]
pub fn sphere_box(
    sphere_pose: &Pose,
    radius: f64,
    box_pose: &Pose,
    half_extents: &Vector3<f64>,
) -> Option<ContactGeometry> {
    let local = box_pose.inverse_transform_point(&sphere_pose.position);
    let closest = Point3::from(local.coords.zip_map(half_extents, |c, h| c.clamp(-h, h)));
    let offset = local - closest;
    let distance = offset.norm();

    let (local_point, local_normal, depth) = if distance > 1e-12 {
        (closest, offset / distance, radius - distance)
    } else {
        // Centre inside the box: leave through the nearest face.
        let gaps = half_extents - local.coords.abs();
        let axis = gaps.imin();
        let sign = if local[axis] < 0.0 { -1.0 } else { 1.0 };
        let mut normal = Vector3::zeros();
        normal[axis] = sign;
        let mut on_face = local;
        on_face[axis] = sign * half_extents[axis];
        (on_face, normal, radius + gaps[axis])
    };

    if depth <= 0.0 {
        return None;
    }

    Some(ContactGeometry {
        point: box_pose.transform_point(&local_point),
        normal: box_pose.transform_vector(&local_normal),
        depth,
    })
}

// =============================================================================
// Box pairs
// =============================================================================

/// The 8 corners of a box in world coordinates.
fn box_vertices(pose: &Pose, half_extents: &Vector3<f64>) -> [Point3<f64>; 8] {
    let mut vertices = [Point3::origin(); 8];
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
        let local = Point3::new(
            sign(1) * half_extents.x,
            sign(2) * half_extents.y,
            sign(4) * half_extents.z,
        );
        *vertex = pose.transform_point(&local);
    }
    vertices
}

/// Box against a plane half-space: one contact per vertex strictly below
/// the plane.
#[must_use]
pub fn box_plane(
    box_pose: &Pose,
    half_extents: &Vector3<f64>,
    plane_normal: &Vector3<f64>,
    plane_offset: f64,
    plane_pose: &Pose,
) -> Vec<ContactGeometry> {
    let (normal, distance) = plane_in_world(plane_normal, plane_offset, plane_pose);

    box_vertices(box_pose, half_extents)
        .into_iter()
        .filter_map(|vertex| {
            let signed = normal.dot(&vertex.coords) - distance;
            (signed < 0.0).then_some(ContactGeometry {
                point: vertex,
                normal,
                depth: -signed,
            })
        })
        .collect()
}

/// World-space axes of an oriented box as matrix columns.
fn box_axes(pose: &Pose) -> Matrix3<f64> {
    *pose.rotation.to_rotation_matrix().matrix()
}

/// Half of the box's extent when projected on `axis`.
fn projected_radius(axes: &Matrix3<f64>, half_extents: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    (0..3)
        .map(|i| half_extents[i] * axes.column(i).dot(axis).abs())
        .sum()
}

/// A box with its world-space axes, as the box pair routines see it.
#[derive(Debug, Clone, Copy)]
struct OrientedBox<'a> {
    pose: &'a Pose,
    half: &'a Vector3<f64>,
    axes: &'a Matrix3<f64>,
}

/// The two box axes other than `axis`.
fn other_axes(axis: usize) -> (usize, usize) {
    ((axis + 1) % 3, (axis + 2) % 3)
}

#[derive(Debug, Clone, Copy)]
enum SeparatingAxis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

/// Oriented box A against oriented box B.
///
/// The separating axis test picks the axis of least penetration (the first
/// face axis wins ties); it gives the normal and the depth. For a face axis
/// the contact point comes from [`face_contact_point`], so it moves
/// continuously as the boxes tilt against each other. For an edge axis it is
/// midway between the closest points of the two edges.
#[must_use]
pub fn box_box(
    pose_a: &Pose,
    half_a: &Vector3<f64>,
    pose_b: &Pose,
    half_b: &Vector3<f64>,
    motion: &RelativeMotion,
) -> Option<ContactGeometry> {
    let axes_a = box_axes(pose_a);
    let axes_b = box_axes(pose_b);
    let between = pose_a.position - pose_b.position;

    let overlap_on = |axis: &Vector3<f64>| {
        projected_radius(&axes_a, half_a, axis) + projected_radius(&axes_b, half_b, axis)
            - between.dot(axis).abs()
    };

    let mut best: Option<(f64, Vector3<f64>, SeparatingAxis)> = None;
    let mut consider = |axis: Vector3<f64>, kind: SeparatingAxis, bias: f64| -> bool {
        let overlap = overlap_on(&axis);
        if overlap <= 0.0 {
            return false;
        }
        if best.is_none_or(|(current, _, _)| overlap < current - bias) {
            best = Some((overlap, axis, kind));
        }
        true
    };

    for i in 0..3 {
        if !consider(axes_a.column(i).into_owned(), SeparatingAxis::FaceA(i), 0.0) {
            return None;
        }
    }
    for i in 0..3 {
        if !consider(axes_b.column(i).into_owned(), SeparatingAxis::FaceB(i), 0.0) {
            return None;
        }
    }
    for i in 0..3 {
        for j in 0..3 {
            let cross = axes_a.column(i).cross(&axes_b.column(j));
            let length = cross.norm();
            if length < 1e-9 {
                // Parallel edges: already covered by the face axes.
                continue;
            }
            if !consider(cross / length, SeparatingAxis::Edge(i, j), EDGE_AXIS_BIAS) {
                return None;
            }
        }
    }

    let (depth, axis, kind) = best?;
    let normal = if between.dot(&axis) < 0.0 { -axis } else { axis };

    let box_a = OrientedBox {
        pose: pose_a,
        half: half_a,
        axes: &axes_a,
    };
    let box_b = OrientedBox {
        pose: pose_b,
        half: half_b,
        axes: &axes_b,
    };
    let closing = |point: &Point3<f64>| motion.closing_depth(pose_a, pose_b, point, &normal);

    let point = match kind {
        SeparatingAxis::FaceA(i) => face_contact_point(&box_a, i, &-normal, &box_b, closing),
        SeparatingAxis::FaceB(i) => face_contact_point(&box_b, i, &normal, &box_a, closing),
        SeparatingAxis::Edge(i, j) => Some(edge_midpoint(&box_a, i, &box_b, j, &normal)),
    }
    .unwrap_or_else(|| deepest_vertex(&box_a, &normal));

    Some(ContactGeometry {
        point,
        normal,
        depth,
    })
}

/// Representative point of a face contact.
///
/// The face of `incident` most opposed to the reference face (the face of
/// `reference` along `axis` with outward normal `outward`) is clipped to the
/// reference face's side planes. Each clipped corner is weighted by its
/// depth below the reference face plus `closing` at that corner, the depth it
/// gains over the coming step. The result is the weighted centroid of the
/// corners, each taken midway between the two faces, so it leans toward the
/// side that is sinking in. `None` when no corner has positive weight.
fn face_contact_point(
    reference: &OrientedBox<'_>,
    axis: usize,
    outward: &Vector3<f64>,
    incident: &OrientedBox<'_>,
    closing: impl Fn(&Point3<f64>) -> f64,
) -> Option<Point3<f64>> {
    let alignment = |k: usize| incident.axes.column(k).dot(outward);
    let incident_axis = (1..3).fold(0, |chosen, k| {
        if alignment(k).abs() > alignment(chosen).abs() {
            k
        } else {
            chosen
        }
    });
    let side = -alignment(incident_axis).signum();

    let (u, v) = other_axes(incident_axis);
    let centre = incident.pose.position
        + incident.axes.column(incident_axis) * (side * incident.half[incident_axis]);
    let du = incident.axes.column(u) * incident.half[u];
    let dv = incident.axes.column(v) * incident.half[v];
    let mut polygon = vec![
        centre - du - dv,
        centre + du - dv,
        centre + du + dv,
        centre - du + dv,
    ];

    let (j, k) = other_axes(axis);
    for side_axis in [j, k] {
        let direction = reference.axes.column(side_axis).into_owned();
        let offset = direction.dot(&reference.pose.position.coords);
        let half = reference.half[side_axis];
        polygon = clip_polygon(&polygon, &direction, offset + half);
        polygon = clip_polygon(&polygon, &-direction, half - offset);
    }

    let face_offset = outward.dot(&reference.pose.position.coords) + reference.half[axis];
    let mut weighted = Vector3::zeros();
    let mut total = 0.0;
    for corner in &polygon {
        let depth = face_offset - outward.dot(&corner.coords);
        let weight = depth + closing(corner);
        if weight > 0.0 {
            weighted += (corner + outward * (0.5 * depth)).coords * weight;
            total += weight;
        }
    }

    (total > 0.0).then(|| Point3::from(weighted / total))
}

/// The part of a convex polygon where `normal · p <= offset`.
fn clip_polygon(polygon: &[Point3<f64>], normal: &Vector3<f64>, offset: f64) -> Vec<Point3<f64>> {
    let mut clipped = Vec::with_capacity(polygon.len() + 1);
    for (index, current) in polygon.iter().enumerate() {
        let next = &polygon[(index + 1) % polygon.len()];
        let d_current = normal.dot(&current.coords) - offset;
        let d_next = normal.dot(&next.coords) - offset;
        if d_current <= 0.0 {
            clipped.push(*current);
        }
        if (d_current < 0.0 && d_next > 0.0) || (d_current > 0.0 && d_next < 0.0) {
            let t = d_current / (d_current - d_next);
            clipped.push(current + (next - current) * t);
        }
    }
    clipped
}

/// Vertex of box A reaching furthest toward B, against `normal`.
fn deepest_vertex(a: &OrientedBox<'_>, normal: &Vector3<f64>) -> Point3<f64> {
    let signs = (a.axes.transpose() * normal).map(f64::signum);
    a.pose.position - a.axes * a.half.component_mul(&signs)
}

/// Midpoint of the closest points between the touching edge of A along its
/// axis `i` and the touching edge of B along its axis `j`.
fn edge_midpoint(
    a: &OrientedBox<'_>,
    i: usize,
    b: &OrientedBox<'_>,
    j: usize,
    normal: &Vector3<f64>,
) -> Point3<f64> {
    // Centre of the edge of A that faces B (A lies along +normal from B).
    let mut edge_a = a.pose.position;
    for k in (0..3).filter(|&k| k != i) {
        let axis = a.axes.column(k);
        edge_a -= axis * (a.half[k] * axis.dot(normal).signum());
    }
    let mut edge_b = b.pose.position;
    for k in (0..3).filter(|&k| k != j) {
        let axis = b.axes.column(k);
        edge_b += axis * (b.half[k] * axis.dot(normal).signum());
    }

    let dir_a = a.axes.column(i).into_owned();
    let dir_b = b.axes.column(j).into_owned();
    let r = edge_a - edge_b;
    let cos = dir_a.dot(&dir_b);
    let c = dir_a.dot(&r);
    let f = dir_b.dot(&r);
    let denom = 1.0 - cos * cos;

    let s = if denom > 1e-12 {
        ((cos * f - c) / denom).clamp(-a.half[i], a.half[i])
    } else {
        0.0
    };
    let t = (cos * s + f).clamp(-b.half[j], b.half[j]);

    let on_a = edge_a + dir_a * s;
    let on_b = edge_b + dir_b * t;
    Point3::from((on_a.coords + on_b.coords) * 0.5)
}
