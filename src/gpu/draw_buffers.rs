use bevy::prelude::*;
use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};

use crate::config::SimulationConfig;
use crate::frame::FrameParameters;
use crate::gpu::buffers::FrameUniforms;
use crate::gpu::ffi::DrawParams;

// ---------------- Types ----------------

#[derive(Resource, Clone)]
pub struct DrawBindGroupLayout(pub BindGroupLayout);

#[derive(Resource)]
pub struct DrawBindGroup(pub BindGroup);

#[derive(Resource)]
pub struct QuadVertexBuffer {
    pub buffer: Buffer,
}

// two triangles, unit square centred on the particle
pub(crate) const QUAD_VERTS: &[[f32; 2]] = &[
    [-0.5, -0.5],
    [0.5, -0.5],
    [0.5, 0.5],
    [-0.5, -0.5],
    [0.5, 0.5],
    [-0.5, 0.5],
];

// ---------------- Setup (Render world) ----------------

/// Quad VB, the DrawParams layout and its bind group. The uniform buffer
/// itself lives in `FrameUniforms` and only its contents change per frame.
pub fn init_draw_resources(world: &mut World, rd: &RenderDevice) {
    let vb = rd.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("instanced_quad_vb"),
        contents: bytemuck::cast_slice(QUAD_VERTS),
        usage: BufferUsages::VERTEX,
    });
    world.insert_resource(QuadVertexBuffer { buffer: vb });

    let bgl = rd.create_bind_group_layout(
        Some("draw_bgl"),
        &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    );

    let Some(uniforms) = world.get_resource::<FrameUniforms>() else {
        warn!("draw resources: FrameUniforms missing, particles will not be drawn");
        world.insert_resource(DrawBindGroupLayout(bgl));
        return;
    };
    let bg = rd.create_bind_group(
        Some("draw_bg"),
        &bgl,
        &[BindGroupEntry {
            binding: 0,
            resource: uniforms.draw.as_entire_binding(),
        }],
    );
    world.insert_resource(DrawBindGroup(bg));
    world.insert_resource(DrawBindGroupLayout(bgl));
    info!("draw_bgl is READY");
}

// ---------------- Systems (Render world) ----------------

// Camera changes every frame; the billboard axes come from the same view.
pub fn prepare_draw_params(
    rq: Res<RenderQueue>,
    uniforms: Option<Res<FrameUniforms>>,
    params: Option<Res<FrameParameters>>,
    config: Option<Res<SimulationConfig>>,
) {
    let (Some(uniforms), Some(params), Some(config)) = (uniforms, params, config) else {
        return;
    };
    let dp = DrawParams::new(&params, config.particle_size);
    rq.write_buffer(&uniforms.draw, 0, bytemuck::bytes_of(&dp));
}
