use std::f32::consts::FRAC_PI_4;

use bevy::prelude::*;
use bevy::render::camera::CameraProjection;
use bevy_particle_obstacles::SimulationConfig;
use bevy_particle_obstacles::camera::{OrbitCamera, camera_bundle, locked_transform};

fn spawned_projection() -> (Projection, Transform) {
    let config = SimulationConfig::default();
    let mut world = World::new();
    let camera = world.spawn(camera_bundle(&config)).id();
    let entity = world.entity(camera);
    assert!(entity.contains::<OrbitCamera>());
    (
        entity.get::<Projection>().unwrap().clone(),
        *entity.get::<Transform>().unwrap(),
    )
}

#[test]
fn camera_starts_at_the_locked_pose() {
    let (_, transform) = spawned_projection();
    assert_eq!(transform, locked_transform(&SimulationConfig::default()));
}

#[test]
fn perspective_is_infinite_reverse_z() {
    let (projection, _) = spawned_projection();
    let Projection::Perspective(perspective) = projection else {
        panic!("expected a perspective projection");
    };
    assert_eq!(perspective.fov, FRAC_PI_4);
    assert_eq!(perspective.near, 0.1);

    let clip_from_view = perspective.get_clip_from_view();
    let depth = |z: f32| {
        let clip = clip_from_view * Vec4::new(0.0, 0.0, z, 1.0);
        clip.z / clip.w
    };
    // near plane maps to 1, depth shrinks toward 0 and never clips far away
    assert!((depth(-0.1) - 1.0).abs() < 1e-5);
    assert!(depth(-5_000.0) > 0.0);
    assert!(depth(-5_000.0) < depth(-10.0));
}
