use std::f32::consts::FRAC_PI_4;

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;

use crate::config::{ControlPanel, SimulationConfig};

/// Orbit/zoom camera around the locked target. Only moves while the
/// control panel has the camera unlocked.
#[derive(Component, Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub sensitivity: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            sensitivity: 0.005,
            zoom_speed: 10.0,
        }
    }
}

pub fn locked_transform(config: &SimulationConfig) -> Transform {
    Transform::from_translation(config.locked_eye).looking_at(config.locked_target, Vec3::Y)
}

/// Perspective camera at the locked pose: fov 45 degrees, near 0.1. Bevy's
/// projection is infinite reverse-Z, so `far` only bounds frustum culling.
pub fn camera_bundle(config: &SimulationConfig) -> impl Bundle {
    (
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
            ..default()
        }),
        locked_transform(config),
        OrbitCamera::default(),
    )
}

pub fn update_camera(
    time: Res<Time>,
    controls: Res<ControlPanel>,
    config: Res<SimulationConfig>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut evr_motion: EventReader<MouseMotion>,
    mut evr_scroll: EventReader<MouseWheel>,
    mut query: Query<(&mut Transform, &OrbitCamera)>,
) {
    let center = config.locked_target;

    if controls.camera_locked {
        // drop input that arrived while locked
        evr_motion.clear();
        evr_scroll.clear();
        let locked = locked_transform(&config);
        for (mut transform, _) in &mut query {
            if *transform != locked {
                *transform = locked;
            }
        }
        return;
    }

    let dt = time.delta_secs();
    let dragging = mouse_button.pressed(MouseButton::Left);
    let motion: Vec2 = evr_motion.read().map(|ev| ev.delta).sum();
    let scroll: f32 = evr_scroll.read().map(|ev| ev.y).sum();

    for (mut transform, control) in &mut query {
        if dragging && motion != Vec2::ZERO {
            let right = transform.right();
            let yaw = Quat::from_axis_angle(Vec3::Y, -motion.x * control.sensitivity);
            let pitch = Quat::from_axis_angle(*right, -motion.y * control.sensitivity);

            let camera_offset = transform.translation - center;
            transform.translation = center + yaw * pitch * camera_offset;
            transform.look_at(center, Vec3::Y);
        }

        if scroll != 0.0 {
            let camera_offset = transform.translation - center;
            let zoom_delta = camera_offset.normalize_or_zero() * scroll * control.zoom_speed * dt;
            // never zoom through the target
            if zoom_delta.length() < camera_offset.length() {
                transform.translation -= zoom_delta;
            }
            transform.look_at(center, Vec3::Y);
        }
    }
}
