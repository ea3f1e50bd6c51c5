use bevy::asset::AssetServer;
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use bevy::render::render_resource::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, CachedPipelineState,
    CachedRenderPipelineId, ColorTargetState, ColorWrites, FragmentState, MultisampleState,
    PipelineCache, PrimitiveState, RenderPipelineDescriptor, Shader, VertexAttribute,
    VertexBufferLayout, VertexFormat, VertexState, VertexStepMode,
};

use super::draw_buffers::DrawBindGroupLayout;
use crate::generations::STREAM_STRIDE;

#[derive(Resource)]
pub struct DrawPipeline(pub CachedRenderPipelineId);

// per-instance attribute stream read straight out of a generation buffer
fn instance_stream(shader_location: u32) -> VertexBufferLayout {
    VertexBufferLayout {
        array_stride: STREAM_STRIDE,
        step_mode: VertexStepMode::Instance,
        attributes: vec![VertexAttribute {
            format: VertexFormat::Float32x4,
            offset: 0,
            shader_location,
        }],
    }
}

pub fn prepare_draw_pipeline(
    mut commands: Commands,
    cache: Res<PipelineCache>,
    bgl: Option<Res<DrawBindGroupLayout>>,
    ready: Option<Res<DrawPipeline>>,
    assets: Res<AssetServer>,
    mut cached: Local<Option<CachedRenderPipelineId>>,
) {
    let Some(bgl) = bgl else {
        return;
    };
    if ready.is_some() {
        return;
    }

    let Some(id) = *cached else {
        let shader: Handle<Shader> = assets.load("shaders/particles_draw.wgsl");

        // 0 quad corner, 1 position (w = seconds alive), 2 color
        let buffers = vec![
            VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: VertexStepMode::Vertex,
                attributes: vec![VertexAttribute {
                    format: VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 0,
                }],
            },
            instance_stream(1),
            instance_stream(2),
        ];

        // overlapping particles accumulate brightness
        let additive = BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Add,
        };

        let desc = RenderPipelineDescriptor {
            label: Some("particles_draw_pipeline".into()),
            layout: vec![bgl.0.clone()],
            vertex: VertexState {
                shader: shader.clone(),
                entry_point: "vs_main".into(),
                shader_defs: vec![],
                buffers,
            },
            fragment: Some(FragmentState {
                shader,
                entry_point: "fs_main".into(),
                shader_defs: vec![],
                targets: vec![Some(ColorTargetState {
                    format: TextureFormat::Rgba8UnormSrgb,
                    blend: Some(BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState {
                count: 4, // default Msaa::Sample4 on the camera
                ..Default::default()
            },
            push_constant_ranges: vec![],
            zero_initialize_workgroup_memory: false,
        };

        *cached = Some(cache.queue_render_pipeline(desc));
        info!("draw_pipeline QUEUED");
        return;
    };

    match cache.get_render_pipeline_state(id) {
        CachedPipelineState::Ok(_) => {
            info!("draw_pipeline READY");
            commands.insert_resource(DrawPipeline(id));
        }
        CachedPipelineState::Err(err) => {
            error!("draw_pipeline ERROR: {err:?}");
        }
        CachedPipelineState::Queued | CachedPipelineState::Creating(_) => {}
    }
}
