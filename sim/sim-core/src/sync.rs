//! Pushing body poses out to a presentation layer.
//!
//! A renderer keeps its own scene objects. After each step the world hands
//! every body's pose to a [`PoseSink`], which copies it onto whatever the
//! renderer uses. The world never holds references into the renderer.
//!
//! Closures are sinks, so the common case needs no extra type:
//!
//! ```
//! use sim_core::{BodyDesc, BodyId, Pose, Shape, World};
//! use nalgebra::Point3;
//!
//! let mut world = World::default();
//! world
//!     .add_body(
//!         BodyDesc::dynamic(Shape::sphere(1.0).unwrap(), 1.0)
//!             .with_position(Point3::new(0.0, 5.0, 0.0)),
//!     )
//!     .unwrap();
//!
//! let mut heights = Vec::new();
//! world.sync_poses(&mut |_id: BodyId, pose: &Pose| heights.push(pose.position.y));
//! assert_eq!(heights, vec![5.0]);
//! ```

use hashbrown::HashMap;
use sim_types::{BodyId, Pose, PoseObservation};

/// Receives body poses, once per body per sync.
pub trait PoseSink {
    /// Copy `pose` onto the presentation object tracking `id`.
    fn sync_pose(&mut self, id: BodyId, pose: &Pose);
}

impl<F> PoseSink for F
where
    F: FnMut(BodyId, &Pose),
{
    fn sync_pose(&mut self, id: BodyId, pose: &Pose) {
        self(id, pose);
    }
}

/// Latest pose per body, keyed by ID.
impl PoseSink for HashMap<BodyId, Pose> {
    fn sync_pose(&mut self, id: BodyId, pose: &Pose) {
        self.insert(id, *pose);
    }
}

/// Overwrites the entry for `id` if present, appends otherwise.
impl PoseSink for Vec<PoseObservation> {
    fn sync_pose(&mut self, id: BodyId, pose: &Pose) {
        match self.iter_mut().find(|p| p.body == id) {
            Some(existing) => existing.pose = *pose,
            None => self.push(PoseObservation::new(id, *pose)),
        }
    }
}
