use bevy::core_pipeline::core_3d::graph::{Core3d, Node3d};
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResourcePlugin;
use bevy::render::render_graph::{RenderGraphApp, ViewNodeRunner};
use bevy::render::camera::CameraUpdateSystem;
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingResource,
    BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferInitDescriptor, BufferUsages,
    ShaderStages, TextureSampleType, TextureViewDimension,
};
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bevy::render::{Render, RenderApp, RenderSet};
use bevy::transform::TransformSystem;

use crate::camera::update_camera;
use crate::config::{ControlPanel, SimulationConfig};
use crate::error::{SimError, SimResult};
use crate::frame::{
    FrameDriver, FrameParameters, ObstacleField, SimulationDisabled, drive_frame, handle_pointer,
    init_obstacle_field, simulation_enabled, stamp_default_obstacles,
};
use crate::generations::{
    FEEDBACK_WORKGROUP_SIZE, ParticleBufferSet, STREAM_STRIDE, check_particle_count,
    check_platform_support, particle_ids,
};
use crate::gpu::draw_buffers::{init_draw_resources, prepare_draw_params};
use crate::gpu::draw_pass::{ParticlesDrawNode, ParticlesDrawPassLabel};
use crate::gpu::draw_pipeline::prepare_draw_pipeline;
use crate::gpu::ffi::{DrawParams, GpuFrameParams};
use crate::gpu::obstacle::{
    ObstacleFieldTextures, PendingStamps, PreparedStamps, extract_obstacle_field,
    init_obstacle_layouts, prepare_obstacle_field, prepare_obstacle_pipelines,
    prepare_obstacle_stamps,
};
use crate::gpu::obstacle_overlay::{
    ObstacleOverlayNode, ObstacleOverlayPassLabel, prepare_overlay_pipeline,
};
use crate::gpu::pipeline::{
    FeedbackPipeline, add_simulation_nodes_to_graph, prepare_feedback_pipeline,
};
use crate::gpu::readback::{AllowCopy, ReadbackBuffers};

// ==================== resources ======================================

/// One generation: the mutable attribute streams. Always bound as a unit,
/// never stream by stream. Age rides in the `.w` lanes of position
/// (seconds alive) and velocity (ticks alive).
#[derive(Clone)]
pub struct GpuGeneration {
    pub position: Buffer,
    pub velocity: Buffer,
    pub color: Buffer,
}

pub type GpuParticleSet = ParticleBufferSet<GpuGeneration, Buffer>;

// Render world: both generations plus the shared id stream
#[derive(Resource)]
pub struct ParticleBuffers {
    pub set: GpuParticleSet,
}

#[derive(Resource, Clone)]
pub struct FeedbackBindGroupLayout(pub BindGroupLayout);

/// Valid for the frame it was prepared in; absent when no feedback is issued.
#[derive(Resource)]
pub struct FeedbackBindGroup {
    pub bind_group: BindGroup,
    pub workgroups: u32,
}

/// Generation the draw pass reads this frame (current after the swap).
#[derive(Resource, Clone)]
pub struct DrawGeneration {
    pub generation: GpuGeneration,
    pub num_particles: u32,
}

#[derive(Resource)]
pub struct FrameUniforms {
    pub feedback: Buffer,
    pub draw: Buffer,
}

// =====================================================================

// Implementations

impl GpuGeneration {
    fn new(render_device: &RenderDevice, tag: &str, num_particles: u32) -> Self {
        // xyz + packed lane, so every stream shares one stride
        let zeros = vec![[0.0f32; 4]; num_particles as usize];
        let stream = |name: &str| {
            render_device.create_buffer_with_data(&BufferInitDescriptor {
                label: Some(&format!("particle_{name}_{tag}")),
                contents: bytemuck::cast_slice(&zeros),
                usage: BufferUsages::STORAGE
                    | BufferUsages::VERTEX
                    | BufferUsages::COPY_DST
                    | BufferUsages::COPY_SRC,
            })
        };
        Self {
            position: stream("position"),
            velocity: stream("velocity"),
            color: stream("color"),
        }
    }

    /// Position, velocity, color in binding order.
    pub fn streams(&self) -> [&Buffer; 3] {
        [&self.position, &self.velocity, &self.color]
    }
}

impl ParticleBufferSet<GpuGeneration, Buffer> {
    pub fn initialize(render_device: &RenderDevice, num_particles: u32) -> SimResult<Self> {
        let limits = render_device.limits();
        check_platform_support(&limits)?;
        check_particle_count(num_particles, &limits)?;

        let ids = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("particle_ids"),
            contents: bytemuck::cast_slice(&particle_ids(num_particles)),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        });
        Ok(Self::from_parts(
            [
                GpuGeneration::new(render_device, "a", num_particles),
                GpuGeneration::new(render_device, "b", num_particles),
            ],
            ids,
            num_particles,
        ))
    }
}

fn storage_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl FeedbackBindGroupLayout {
    // 0..=2 generation N (ro), 3 ids (ro), 4..=6 generation N+1 (rw),
    // 7 obstacle field, 8 FrameParams
    pub fn new(render_device: &RenderDevice) -> Self {
        let layout = render_device.create_bind_group_layout(
            Some("feedback_bind_group_layout"),
            &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
                storage_entry(5, false),
                storage_entry(6, false),
                BindGroupLayoutEntry {
                    binding: 7,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 8,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        );
        Self(layout)
    }
}

impl FrameUniforms {
    pub fn new(render_device: &RenderDevice) -> Self {
        let uniform = |label: &'static str, size: usize| {
            render_device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            feedback: uniform("feedback_params_uniform", size_of::<GpuFrameParams>()),
            draw: uniform("draw_params_uniform", size_of::<DrawParams>()),
        }
    }
}

// ========================== systems ==================================

// Render world, per frame

pub fn prepare_frame_uniforms(
    render_queue: Res<RenderQueue>,
    uniforms: Option<Res<FrameUniforms>>,
    buffers: Option<Res<ParticleBuffers>>,
    field: Option<Res<ObstacleFieldTextures>>,
    params: Option<Res<FrameParameters>>,
) {
    let (Some(uniforms), Some(buffers), Some(params)) = (uniforms, buffers, params) else {
        return;
    };
    let field_size = field.map_or([1, 1], |f| f.size.to_array());
    let gpu = GpuFrameParams::new(&params, field_size, buffers.set.num_particles());
    render_queue.write_buffer(&uniforms.feedback, 0, bytemuck::bytes_of(&gpu));
}

/// Runs the generation protocol for this frame: begin, bind N -> N+1,
/// issue, swap. The graph then records feedback before the draw, so the
/// draw reads N+1 on the GPU as well.
pub fn advance_generations(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    buffers: Option<ResMut<ParticleBuffers>>,
    layout: Option<Res<FeedbackBindGroupLayout>>,
    pipeline: Option<Res<FeedbackPipeline>>,
    field: Option<Res<ObstacleFieldTextures>>,
    uniforms: Option<Res<FrameUniforms>>,
    pending: Res<PendingStamps>,
) {
    let Some(mut buffers) = buffers else {
        return;
    };

    commands.remove_resource::<FeedbackBindGroup>();
    // stamps that could not be burned in yet would be missed by this read
    let field_settled = pending.stamps.is_empty();
    if let (Some(layout), Some(_), Some(field), Some(uniforms), true) =
        (layout, pipeline, field, uniforms, field_settled)
    {
        match issue_feedback(&render_device, &mut buffers.set, &layout, &field, &uniforms) {
            Ok(feedback) => commands.insert_resource(feedback),
            Err(err) => error!("feedback pass skipped: {err}"),
        }
    }

    commands.insert_resource(DrawGeneration {
        generation: buffers.set.current_generation().clone(),
        num_particles: buffers.set.num_particles(),
    });
}

fn issue_feedback(
    render_device: &RenderDevice,
    set: &mut GpuParticleSet,
    layout: &FeedbackBindGroupLayout,
    field: &ObstacleFieldTextures,
    uniforms: &FrameUniforms,
) -> SimResult<FeedbackBindGroup> {
    let num_particles = set.num_particles();
    set.begin_frame()?;
    let (read, write, ids) = set.feedback_io()?;

    // generation N, ids, generation N+1 occupy bindings 0..=6 in order
    let mut entries: Vec<BindGroupEntry> = read
        .streams()
        .into_iter()
        .chain([ids])
        .chain(write.streams())
        .enumerate()
        .map(|(binding, buffer)| BindGroupEntry {
            binding: binding as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    entries.push(BindGroupEntry {
        binding: 7,
        resource: BindingResource::TextureView(&field.field_view),
    });
    entries.push(BindGroupEntry {
        binding: 8,
        resource: uniforms.feedback.as_entire_binding(),
    });
    let bind_group =
        render_device.create_bind_group(Some("feedback_bind_group"), &layout.0, &entries);

    set.feedback_issued()?;
    set.swap()?;

    Ok(FeedbackBindGroup {
        bind_group,
        workgroups: num_particles.div_ceil(FEEDBACK_WORKGROUP_SIZE),
    })
}

// =====================================================================

// Plugin

pub struct ParticleSimPlugin;

impl Plugin for ParticleSimPlugin {
    fn build(&self, app: &mut App) {
        // App
        app.init_resource::<SimulationConfig>()
            .init_resource::<ControlPanel>()
            .init_resource::<ObstacleField>()
            .init_resource::<FrameParameters>()
            .init_resource::<FrameDriver>()
            .init_resource::<AllowCopy>()
            .add_plugins((
                ExtractResourcePlugin::<FrameParameters>::default(),
                ExtractResourcePlugin::<SimulationConfig>::default(),
                ExtractResourcePlugin::<AllowCopy>::default(),
            ))
            .add_systems(Startup, init_obstacle_field.run_if(simulation_enabled))
            .add_systems(Update, update_camera.run_if(simulation_enabled))
            .add_systems(
                PostUpdate,
                (drive_frame, (stamp_default_obstacles, handle_pointer))
                    .chain()
                    .after(TransformSystem::TransformPropagate)
                    .after(CameraUpdateSystem)
                    .run_if(simulation_enabled),
            );

        // Render
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };
        render_app
            .init_resource::<PendingStamps>()
            .init_resource::<PreparedStamps>()
            .add_systems(
                ExtractSchedule,
                extract_obstacle_field.run_if(simulation_enabled),
            )
            .add_systems(
                Render,
                (
                    (
                        prepare_feedback_pipeline,
                        prepare_obstacle_pipelines,
                        prepare_overlay_pipeline,
                        prepare_draw_pipeline,
                        prepare_obstacle_field,
                    ),
                    (prepare_frame_uniforms, prepare_draw_params, prepare_obstacle_stamps),
                    advance_generations,
                )
                    .chain()
                    .in_set(RenderSet::Prepare),
            );

        add_simulation_nodes_to_graph(render_app);
        render_app
            .add_render_graph_node::<ViewNodeRunner<ObstacleOverlayNode>>(
                Core3d,
                ObstacleOverlayPassLabel,
            )
            .add_render_graph_node::<ViewNodeRunner<ParticlesDrawNode>>(
                Core3d,
                ParticlesDrawPassLabel,
            )
            .add_render_graph_edges(
                Core3d,
                (
                    Node3d::MainTransparentPass,
                    ObstacleOverlayPassLabel,
                    ParticlesDrawPassLabel,
                    Node3d::EndMainPass,
                ),
            );
    }

    // RenderDevice exists from here on
    fn finish(&self, app: &mut App) {
        let num_particles = app.world().resource::<SimulationConfig>().num_particles;
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };
        let render_device = render_app.world().resource::<RenderDevice>().clone();

        match init_render_resources(render_app.world_mut(), &render_device, num_particles) {
            Ok(readback) => {
                info!("particle buffers ready: {num_particles} particles x 2 generations");
                app.insert_resource(readback);
            }
            // reported once; nothing runs afterwards
            Err(err) => {
                error!("particle simulation disabled: {err}");
                render_app.insert_resource(SimulationDisabled);
                app.insert_resource(SimulationDisabled);
                app.world_mut().resource_mut::<ObstacleField>().disable();
            }
        }
    }
}

fn init_render_resources(
    world: &mut World,
    render_device: &RenderDevice,
    num_particles: u32,
) -> Result<ReadbackBuffers, SimError> {
    let set = GpuParticleSet::initialize(render_device, num_particles)?;
    world.insert_resource(ParticleBuffers { set });
    world.insert_resource(FeedbackBindGroupLayout::new(render_device));
    world.insert_resource(FrameUniforms::new(render_device));
    init_obstacle_layouts(world, render_device);
    init_draw_resources(world, render_device);

    let readback = ReadbackBuffers::new(render_device, num_particles);
    world.insert_resource(readback.clone());
    Ok(readback)
}

// stride is shared with the draw pass vertex layouts
const _: () = assert!(STREAM_STRIDE == size_of::<[f32; 4]>() as u64);
