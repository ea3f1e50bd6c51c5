use bytemuck::{Pod, Zeroable};

use crate::frame::{FrameParameters, ObstacleStamp};

// not using glam to make sure WGSL compatibility

/// `FrameParams` in particle_feedback.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuFrameParams {
    pub view_proj: [[f32; 4]; 4],
    pub gravity: [f32; 4],
    pub particle_color: [f32; 4],
    pub obstacle_pointer: [f32; 2],
    pub field_size: [f32; 2],
    pub elapsed_ticks: f32,
    pub dt: f32,
    pub threshold: f32,
    pub restitution: f32,
    pub escape_speed: f32,
    pub pointer_bias: f32,
    pub num_particles: u32,
    pub _pad: u32,
}

impl GpuFrameParams {
    pub fn new(params: &FrameParameters, field_size: [u32; 2], num_particles: u32) -> Self {
        Self {
            view_proj: params.view_proj().to_cols_array_2d(),
            gravity: params.gravity.extend(0.0).to_array(),
            particle_color: params.particle_color.extend(1.0).to_array(),
            obstacle_pointer: params.last_obstacle_pointer.to_array(),
            field_size: [field_size[0] as f32, field_size[1] as f32],
            elapsed_ticks: params.elapsed_ticks as f32,
            dt: params.dt,
            threshold: params.collision.threshold,
            restitution: params.collision.restitution,
            escape_speed: params.collision.escape_speed,
            pointer_bias: params.collision.pointer_bias,
            num_particles,
            _pad: 0,
        }
    }
}

/// `StampParams` in obstacle_draw.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuStampParams {
    pub center_ndc: [f32; 2],
    pub field_size: [f32; 2],
    pub radius: f32,
    pub _pad: [f32; 3],
}

impl GpuStampParams {
    pub fn new(stamp: &ObstacleStamp, field_size: [u32; 2]) -> Self {
        Self {
            center_ndc: stamp.position_ndc.to_array(),
            field_size: [field_size[0] as f32, field_size[1] as f32],
            radius: stamp.size,
            _pad: [0.0; 3],
        }
    }
}

/// `DrawParams` in particles_draw.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawParams {
    pub view_proj: [[f32; 4]; 4],
    pub camera_right: [f32; 4],
    pub camera_up: [f32; 4],
    pub particle_size: f32,
    pub _pad: [f32; 3],
}

impl DrawParams {
    pub fn new(params: &FrameParameters, particle_size: f32) -> Self {
        // rows of the view rotation are the camera axes in world space
        let view = params.view_matrix;
        let right = view.row(0).truncate();
        let up = view.row(1).truncate();
        Self {
            view_proj: params.view_proj().to_cols_array_2d(),
            camera_right: right.extend(0.0).to_array(),
            camera_up: up.extend(0.0).to_array(),
            particle_size,
            _pad: [0.0; 3],
        }
    }
}
