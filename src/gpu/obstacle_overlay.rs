use bevy::prelude::*;
use bevy::render::render_graph::{NodeRunError, RenderGraphContext, RenderLabel, ViewNode};
use bevy::render::render_resource::{
    BlendState, CachedPipelineState, CachedRenderPipelineId, ColorTargetState, ColorWrites,
    FragmentState, MultisampleState, PipelineCache, PrimitiveState, RenderPassDescriptor,
    RenderPipelineDescriptor, TextureFormat, VertexState,
};
use bevy::render::renderer::RenderContext;
use bevy::render::view::ViewTarget;

use crate::gpu::obstacle::{ObstacleBindGroupLayouts, ObstacleFieldTextures};

#[derive(Resource)]
pub struct ObstacleOverlayPipeline(pub CachedRenderPipelineId);

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ObstacleOverlayPassLabel;

// the field view shares the merge layout: one unfiltered texture
pub fn prepare_overlay_pipeline(
    mut commands: Commands,
    cache: Res<PipelineCache>,
    layouts: Option<Res<ObstacleBindGroupLayouts>>,
    ready: Option<Res<ObstacleOverlayPipeline>>,
    assets: Res<AssetServer>,
    mut cached: Local<Option<CachedRenderPipelineId>>,
) {
    let Some(layouts) = layouts else {
        return;
    };
    if ready.is_some() {
        return;
    }

    let Some(id) = *cached else {
        let shader: Handle<Shader> = assets.load("shaders/obstacle_overlay.wgsl");
        let desc = RenderPipelineDescriptor {
            label: Some("obstacle_overlay_pipeline".into()),
            layout: vec![layouts.merge.clone()],
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
                    format: TextureFormat::Rgba8UnormSrgb,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState {
                count: 4, // same view target as the particle draw
                ..Default::default()
            },
            push_constant_ranges: vec![],
            zero_initialize_workgroup_memory: false,
        };
        *cached = Some(cache.queue_render_pipeline(desc));
        info!("overlay_pipeline QUEUED");
        return;
    };

    match cache.get_render_pipeline_state(id) {
        CachedPipelineState::Ok(_) => {
            info!("overlay_pipeline READY");
            commands.insert_resource(ObstacleOverlayPipeline(id));
        }
        CachedPipelineState::Err(err) => {
            error!("overlay_pipeline ERROR: {err:?}");
        }
        CachedPipelineState::Queued | CachedPipelineState::Creating(_) => {}
    }
}

/// Draws the painted obstacles under the particles, every frame.
#[derive(Default)]
pub struct ObstacleOverlayNode;

impl ViewNode for ObstacleOverlayNode {
    type ViewQuery = (&'static ViewTarget,);

    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        rcx: &mut RenderContext,
        (view_target,): <Self::ViewQuery as bevy::ecs::query::QueryData>::Item<'_>,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(overlay) = world.get_resource::<ObstacleOverlayPipeline>() else {
            return Ok(());
        };
        let Some(pipeline) = world.resource::<PipelineCache>().get_render_pipeline(overlay.0) else {
            return Ok(());
        };
        let Some(field) = world.get_resource::<ObstacleFieldTextures>() else {
            return Ok(());
        };

        let mut pass = rcx.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("ObstacleOverlayPass"),
            color_attachments: &[Some(view_target.get_color_attachment())],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_render_pipeline(pipeline);
        pass.set_bind_group(0, &field.display_bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
