//! A spinning box and a sphere dropped onto a static ground slab.
//!
//! The scene is stepped at a fixed 60 Hz. After every step the world pushes
//! its poses into a [`Scene`] standing in for a renderer's objects, and every
//! few steps the scene is printed.
//!
//! ```text
//! cargo run -p falling-bodies -- --seconds 6 --every 30
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use sim_physics::prelude::*;

/// Drop a box and a sphere onto a ground slab and print their poses
#[derive(Parser)]
#[command(name = "falling-bodies")]
#[command(version)]
struct Cli {
    /// Simulated time to run for, in seconds
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Print the scene every N steps
    #[arg(long, default_value_t = 30)]
    every: u64,
}

/// A presentation object mirroring one body.
#[derive(Debug, Clone)]
struct Mesh {
    label: &'static str,
    body: BodyId,
    position: Point3<f64>,
    rotation: UnitQuaternion<f64>,
}

/// What a renderer would hold: one mesh per body.
#[derive(Debug, Default)]
struct Scene {
    meshes: Vec<Mesh>,
}

impl Scene {
    fn track(&mut self, label: &'static str, body: BodyId) {
        self.meshes.push(Mesh {
            label,
            body,
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        });
    }

    fn print(&self, time: f64) {
        println!("t = {time:6.3} s");
        for mesh in &self.meshes {
            let (roll, pitch, yaw) = mesh.rotation.euler_angles();
            println!(
                "  {:<7} pos ({:8.3}, {:8.3}, {:8.3})  rpy ({:6.2}, {:6.2}, {:6.2})",
                mesh.label,
                mesh.position.x,
                mesh.position.y,
                mesh.position.z,
                roll,
                pitch,
                yaw,
            );
        }
    }
}

impl PoseSink for Scene {
    fn sync_pose(&mut self, id: BodyId, pose: &Pose) {
        if let Some(mesh) = self.meshes.iter_mut().find(|m| m.body == id) {
            mesh.position = pose.position;
            mesh.rotation = pose.rotation;
        }
    }
}

/// Build the world and the scene tracking its bodies.
fn build() -> Result<(World, Scene)> {
    let mut world = World::new(SimulationConfig::default())?;
    let mut scene = Scene::default();

    let ground_mat = world.add_material("ground");
    let box_mat = world.add_material("box");
    let sphere_mat = world.add_material("sphere");

    // A thin slab lying flat: its local z axis turned to world up.
    let ground = world
        .add_body(
            BodyDesc::fixed(Shape::cuboid(Vector3::new(15.0, 15.0, 0.1))?)
                .with_rotation(UnitQuaternion::from_axis_angle(
                    &Vector3::x_axis(),
                    -std::f64::consts::FRAC_PI_2,
                ))
                .with_material(ground_mat)
                .with_name("ground"),
        )
        .context("adding ground")?;
    scene.track("ground", ground);

    let cube = world
        .add_body(
            BodyDesc::dynamic(Shape::cuboid(Vector3::new(1.0, 1.0, 1.0))?, 1.0)
                .with_position(Point3::new(-5.0, 30.0, 0.0))
                .with_angular_velocity(Vector3::new(0.0, 10.0, 0.0))
                .with_angular_damping(0.5)
                .with_material(box_mat)
                .with_name("box"),
        )
        .context("adding box")?;
    scene.track("box", cube);

    let ball = world
        .add_body(
            BodyDesc::dynamic(Shape::sphere(2.0)?, 2.0)
                .with_position(Point3::new(-4.0, 23.0, 0.0))
                .with_linear_damping(0.31)
                .with_material(sphere_mat)
                .with_name("sphere"),
        )
        .context("adding sphere")?;
    scene.track("sphere", ball);

    // Slippery ground, modest bounce.
    let slippery = ContactRule::new(0.0, 0.3)?;
    world.add_contact_material(ground_mat, box_mat, slippery)?;
    world.add_contact_material(ground_mat, sphere_mat, slippery)?;

    Ok((world, scene))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.seconds.is_finite() || cli.seconds < 0.0 {
        bail!("--seconds must be a non-negative number (got {})", cli.seconds);
    }
    let every = cli.every.max(1);

    let (mut world, mut scene) = build()?;
    world.sync_poses(&mut scene);
    scene.print(world.time());

    let dt = world.timestep();
    while world.time() + 0.5 * dt < cli.seconds {
        world
            .step(dt)
            .with_context(|| format!("step {} failed", world.step_count() + 1))?;
        world.sync_poses(&mut scene);

        if world.step_count() % every == 0 {
            scene.print(world.time());
        }
    }

    println!(
        "{} steps, {} contacts in the last step, kinetic energy {:.3} J",
        world.step_count(),
        world.last_contacts().len(),
        world.total_kinetic_energy()
    );
    Ok(())
}
