/* compute node follows bevy's compute_shader_game_of_life example */

use std::borrow::Cow;

use bevy::prelude::*;
use bevy::render::graph::CameraDriverLabel;
use bevy::render::render_graph::{
    Node, NodeRunError, RenderGraph, RenderGraphContext, RenderLabel,
};
use bevy::render::render_resource::{
    CachedComputePipelineId, CachedPipelineState, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, PipelineCache, PushConstantRange, ShaderDefVal,
};
use bevy::render::renderer::RenderContext;

use crate::gpu::buffers::{FeedbackBindGroup, FeedbackBindGroupLayout};
use crate::gpu::obstacle::{ObstacleStampNode, ObstacleStampPassLabel};
use crate::gpu::readback::{ReadbackNode, ReadbackPassLabel};

#[derive(Resource)]
pub struct FeedbackPipeline(pub ComputePipeline);

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct FeedbackPassLabel;

/// Generation N + obstacle field -> generation N+1.
#[derive(Default)]
struct FeedbackNode;

impl Node for FeedbackNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        // nothing issued this frame (pipeline compiling or sim disabled)
        let Some(pipeline) = world.get_resource::<FeedbackPipeline>() else {
            return Ok(());
        };
        let Some(feedback) = world.get_resource::<FeedbackBindGroup>() else {
            return Ok(());
        };

        let mut pass = render_context
            .command_encoder()
            .begin_compute_pass(&ComputePassDescriptor {
                label: Some("particle_feedback_pass"),
                timestamp_writes: None,
            });

        pass.set_pipeline(&pipeline.0);
        pass.set_bind_group(0, &feedback.bind_group, &[]);
        pass.dispatch_workgroups(feedback.workgroups, 1, 1);

        Ok(())
    }
}

pub fn prepare_feedback_pipeline(
    mut commands: Commands,
    pipeline_cache: Res<PipelineCache>,
    layout: Option<Res<FeedbackBindGroupLayout>>,
    ready: Option<Res<FeedbackPipeline>>,
    mut pipeline_id: Local<Option<CachedComputePipelineId>>,
    assets: Res<AssetServer>,
) {
    let Some(layout) = layout else {
        return;
    };
    if ready.is_some() {
        return;
    }

    let Some(id) = *pipeline_id else {
        let shader: Handle<Shader> = assets.load("shaders/particle_feedback.wgsl");
        let desc = ComputePipelineDescriptor {
            label: Some("particle_feedback_pipeline".into()),
            layout: vec![layout.0.clone()],
            push_constant_ranges: Vec::<PushConstantRange>::new(),
            shader,
            shader_defs: Vec::<ShaderDefVal>::new(),
            entry_point: Cow::from("main"),
            zero_initialize_workgroup_memory: false,
        };
        *pipeline_id = Some(pipeline_cache.queue_compute_pipeline(desc));
        return; // waits for compilation
    };

    // grab the compiled GPU object once it exists
    match pipeline_cache.get_compute_pipeline_state(id) {
        CachedPipelineState::Ok(_) => {
            if let Some(pipeline) = pipeline_cache.get_compute_pipeline(id) {
                info!("feedback pipeline READY");
                commands.insert_resource(FeedbackPipeline(pipeline.clone()));
            }
        }
        CachedPipelineState::Err(err) => {
            error!("feedback pipeline ERROR: {err:?}");
        }
        _ => {}
    }
}

/// Main graph: obstacle stamps, feedback, optional readback copy, then the
/// camera driver that runs the view graphs (where particles are drawn).
pub fn add_simulation_nodes_to_graph(render_app: &mut bevy::app::SubApp) {
    let mut graph = render_app.world_mut().resource_mut::<RenderGraph>();
    graph.add_node(ObstacleStampPassLabel, ObstacleStampNode);
    graph.add_node(FeedbackPassLabel, FeedbackNode);
    graph.add_node(ReadbackPassLabel, ReadbackNode);
    graph.add_node_edge(ObstacleStampPassLabel, FeedbackPassLabel);
    graph.add_node_edge(FeedbackPassLabel, ReadbackPassLabel);
    graph.add_node_edge(ReadbackPassLabel, CameraDriverLabel);
}
