// GPU side of the obstacle field. Each stamp is two render passes: a disc
// into the scratch target, then a max-merge of scratch into the field.

use bevy::prelude::*;
use bevy::render::MainWorld;
use bevy::render::render_graph::{Node, NodeRunError, RenderGraphContext, RenderLabel};
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingResource,
    BindingType, BlendComponent, BlendFactor, BlendOperation, BlendState, BufferBindingType,
    BufferInitDescriptor, BufferUsages, CachedPipelineState, CachedRenderPipelineId,
    ColorTargetState, ColorWrites, Extent3d, FragmentState, LoadOp, MultisampleState, Operations,
    PipelineCache, PrimitiveState, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipelineDescriptor, ShaderStages, StoreOp, Texture, TextureDescriptor,
    TextureDimension, TextureFormat, TextureSampleType, TextureUsages, TextureView,
    TextureViewDescriptor, TextureViewDimension, VertexState,
};
use bevy::render::renderer::{RenderContext, RenderDevice};

use crate::frame::{ObstacleField, ObstacleStamp};
use crate::gpu::ffi::GpuStampParams;

pub const OBSTACLE_FIELD_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

// ==================== resources ======================================

/// Stamps handed over from the main world, kept until the stamp
/// pipelines and textures exist.
#[derive(Resource, Default)]
pub struct PendingStamps {
    pub field_size: Option<UVec2>,
    pub stamps: Vec<ObstacleStamp>,
}

#[derive(Resource)]
pub struct ObstacleFieldTextures {
    pub field: Texture,
    pub field_view: TextureView,
    pub scratch: Texture,
    pub scratch_view: TextureView,
    /// stage B reads the scratch target through this
    pub merge_bind_group: BindGroup,
    /// the on-screen overlay reads the field through this
    pub display_bind_group: BindGroup,
    pub size: UVec2,
}

// stage A: StampParams uniform; stage B: scratch texture
#[derive(Resource, Clone)]
pub struct ObstacleBindGroupLayouts {
    pub draw: BindGroupLayout,
    pub merge: BindGroupLayout,
}

#[derive(Resource)]
pub struct ObstaclePipelines {
    pub draw: CachedRenderPipelineId,
    pub merge: CachedRenderPipelineId,
}

/// One stage A bind group per stamp recorded this frame.
#[derive(Resource, Default)]
pub struct PreparedStamps(pub Vec<BindGroup>);

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ObstacleStampPassLabel;

// ========================== systems ==================================

pub fn init_obstacle_layouts(world: &mut World, render_device: &RenderDevice) {
    let draw = render_device.create_bind_group_layout(
        Some("obstacle_draw_bgl"),
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
    let merge = render_device.create_bind_group_layout(
        Some("obstacle_merge_bgl"),
        &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: false },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }],
    );
    world.insert_resource(ObstacleBindGroupLayouts { draw, merge });
}

// Extract: drain the main world queue so every stamp is applied exactly once
pub fn extract_obstacle_field(mut main_world: ResMut<MainWorld>, mut pending: ResMut<PendingStamps>) {
    let Some(mut field) = main_world.get_resource_mut::<ObstacleField>() else {
        return;
    };
    pending.field_size = field.size();
    pending.stamps.extend(field.take_pending());
}

pub fn prepare_obstacle_field(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    pending: Res<PendingStamps>,
    layouts: Option<Res<ObstacleBindGroupLayouts>>,
    existing: Option<Res<ObstacleFieldTextures>>,
) {
    // allocated once; later window resizes keep the field, NDC addressing
    // makes the resolution independent of the viewport
    if existing.is_some() {
        return;
    }
    let (Some(size), Some(layouts)) = (pending.field_size, layouts) else {
        return;
    };

    let target = |label: &'static str| {
        render_device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: OBSTACLE_FIELD_FORMAT,
            // new textures are zero-filled: no obstacle anywhere
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    };
    let field = target("obstacle_field");
    let scratch = target("obstacle_scratch");
    let field_view = field.create_view(&TextureViewDescriptor::default());
    let scratch_view = scratch.create_view(&TextureViewDescriptor::default());

    let merge_bind_group = render_device.create_bind_group(
        Some("obstacle_merge_bg"),
        &layouts.merge,
        &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::TextureView(&scratch_view),
        }],
    );

    let display_bind_group = render_device.create_bind_group(
        Some("obstacle_display_bg"),
        &layouts.merge,
        &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::TextureView(&field_view),
        }],
    );

    info!("obstacle field allocated: {}x{}", size.x, size.y);
    commands.insert_resource(ObstacleFieldTextures {
        field,
        field_view,
        scratch,
        scratch_view,
        merge_bind_group,
        display_bind_group,
        size,
    });
}

pub fn prepare_obstacle_pipelines(
    mut commands: Commands,
    cache: Res<PipelineCache>,
    layouts: Option<Res<ObstacleBindGroupLayouts>>,
    ready: Option<Res<ObstaclePipelines>>,
    assets: Res<AssetServer>,
    mut cached: Local<Option<(CachedRenderPipelineId, CachedRenderPipelineId)>>,
) {
    let Some(layouts) = layouts else {
        return;
    };
    if ready.is_some() {
        return;
    }

    let Some((draw, merge)) = *cached else {
        let draw_shader: Handle<Shader> = assets.load("shaders/obstacle_draw.wgsl");
        let merge_shader: Handle<Shader> = assets.load("shaders/obstacle_merge.wgsl");

        // stage A overwrites the cleared scratch target
        let draw = cache.queue_render_pipeline(stamp_pipeline_descriptor(
            "obstacle_draw_pipeline",
            layouts.draw.clone(),
            draw_shader,
            None,
        ));
        // stage B: per-channel max, so coverage only ever grows
        let max = BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Max,
        };
        let merge = cache.queue_render_pipeline(stamp_pipeline_descriptor(
            "obstacle_merge_pipeline",
            layouts.merge.clone(),
            merge_shader,
            Some(BlendState {
                color: max,
                alpha: max,
            }),
        ));
        *cached = Some((draw, merge));
        info!("obstacle pipelines QUEUED");
        return;
    };

    let states = [cache.get_render_pipeline_state(draw), cache.get_render_pipeline_state(merge)];
    if states.iter().all(|s| matches!(s, CachedPipelineState::Ok(_))) {
        info!("obstacle pipelines READY");
        commands.insert_resource(ObstaclePipelines { draw, merge });
    }
    for state in states {
        if let CachedPipelineState::Err(err) = state {
            error!("obstacle pipeline ERROR: {err:?}");
        }
    }
}

fn stamp_pipeline_descriptor(
    label: &'static str,
    layout: BindGroupLayout,
    shader: Handle<Shader>,
    blend: Option<BlendState>,
) -> RenderPipelineDescriptor {
    RenderPipelineDescriptor {
        label: Some(label.into()),
        layout: vec![layout],
        vertex: VertexState {
            shader: shader.clone(),
            entry_point: "vs_main".into(),
            shader_defs: vec![],
            buffers: vec![],
        },
        fragment: Some(FragmentState {
            shader,
            entry_point: "fs_main".into(),
            shader_defs: vec![],
            targets: vec![Some(ColorTargetState {
                format: OBSTACLE_FIELD_FORMAT,
                blend,
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        push_constant_ranges: vec![],
        zero_initialize_workgroup_memory: false,
    }
}

pub fn prepare_obstacle_stamps(
    mut prepared: ResMut<PreparedStamps>,
    render_device: Res<RenderDevice>,
    mut pending: ResMut<PendingStamps>,
    field: Option<Res<ObstacleFieldTextures>>,
    pipelines: Option<Res<ObstaclePipelines>>,
    layouts: Option<Res<ObstacleBindGroupLayouts>>,
) {
    prepared.0.clear();
    let (Some(field), Some(_), Some(layouts)) = (field, pipelines, layouts) else {
        return; // keep stamps queued until everything exists
    };

    let field_size = field.size.to_array();
    for stamp in pending.stamps.drain(..) {
        let params = GpuStampParams::new(&stamp, field_size);
        let buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("obstacle_stamp_params"),
            contents: bytemuck::bytes_of(&params),
            usage: BufferUsages::UNIFORM,
        });
        prepared.0.push(render_device.create_bind_group(
            Some("obstacle_draw_bg"),
            &layouts.draw,
            &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        ));
    }
}

// ========================== node =====================================

/// Burns every stamp prepared this frame into the field: stage A draws the
/// disc into the scratch target, stage B max-merges scratch into the field.
/// Runs before the feedback node, so feedback never sees a half stamp.
pub struct ObstacleStampNode;

impl Node for ObstacleStampNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(prepared) = world.get_resource::<PreparedStamps>() else {
            return Ok(());
        };
        if prepared.0.is_empty() {
            return Ok(());
        }
        let Some(field) = world.get_resource::<ObstacleFieldTextures>() else {
            return Ok(());
        };
        let Some(pipelines) = world.get_resource::<ObstaclePipelines>() else {
            return Ok(());
        };
        let cache = world.resource::<PipelineCache>();
        let (Some(draw), Some(merge)) = (
            cache.get_render_pipeline(pipelines.draw),
            cache.get_render_pipeline(pipelines.merge),
        ) else {
            return Ok(());
        };

        for stamp_bind_group in &prepared.0 {
            {
                let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                    label: Some("obstacle_stamp_draw"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &field.scratch_view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(LinearRgba::NONE.into()),
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_render_pipeline(draw);
                pass.set_bind_group(0, stamp_bind_group, &[]);
                pass.draw(0..6, 0..1);
            }
            {
                let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                    label: Some("obstacle_stamp_merge"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &field.field_view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_render_pipeline(merge);
                pass.set_bind_group(0, &field.merge_bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        Ok(())
    }
}
