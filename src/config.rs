use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;

pub const GRAVITY_RANGE: (f32, f32) = (1.0, 100.0);
pub const OBSTACLE_SIZE_RANGE: (f32, f32) = (5.0, 200.0);

/// Values exposed by the parameter panel. Bevy change detection on this
/// resource is the change notification the frame driver reacts to.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub particle_color: [u8; 3],
    gravity: f32,
    obstacle_size: f32, // pixels
    pub camera_locked: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            particle_color: [0, 0, 255],
            gravity: 30.0,
            obstacle_size: 30.0,
            camera_locked: true,
        }
    }
}

impl ControlPanel {
    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: f32) {
        self.gravity = gravity.clamp(GRAVITY_RANGE.0, GRAVITY_RANGE.1);
    }

    pub fn obstacle_size(&self) -> f32 {
        self.obstacle_size
    }

    pub fn set_obstacle_size(&mut self, size: f32) {
        self.obstacle_size = size.clamp(OBSTACLE_SIZE_RANGE.0, OBSTACLE_SIZE_RANGE.1);
    }

    // gravity pulls towards -Y in world space
    pub fn gravity_vector(&self) -> Vec3 {
        Vec3::new(0.0, -self.gravity, 0.0)
    }

    pub fn particle_color_linear(&self) -> Vec3 {
        let [r, g, b] = self.particle_color;
        Vec3::new(r as f32, g as f32, b as f32) / 255.0
    }
}

/// How particles react once they sample an occupied texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionSettings {
    /// occupancy above this counts as "inside obstacle"
    pub threshold: f32,
    pub restitution: f32,
    pub escape_speed: f32,
    /// weight of the push away from the last pointer position
    pub pointer_bias: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            restitution: 0.5,
            escape_speed: 20.0,
            pointer_bias: 4.0,
        }
    }
}

#[derive(Resource, Debug, Clone, ExtractResource)]
pub struct SimulationConfig {
    pub num_particles: u32,
    /// fixed simulation step; time advances per tick, not per wall-clock second
    pub seconds_per_tick: f32,
    pub particle_size: f32, // world units
    pub collision: CollisionSettings,
    /// obstacles stamped at startup, as fractions of the window size
    pub default_obstacles: Vec<Vec2>,
    pub locked_eye: Vec3,
    pub locked_target: Vec3,
    pub clear_color: Color,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_particles: 1000,
            seconds_per_tick: 1.0 / 60.0,
            particle_size: 0.6,
            collision: CollisionSettings::default(),
            default_obstacles: vec![Vec2::new(0.5, 0.5)],
            locked_eye: Vec3::new(0.0, 0.0, -100.0),
            locked_target: Vec3::new(0.0, -10.0, 0.0),
            clear_color: Color::srgb(0.1, 0.1, 0.1),
        }
    }
}
