// Copy of the current generation into mappable buffers, for comparing the
// GPU feedback pass against the host reference.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_graph::{Node, NodeRunError, RenderGraphContext, RenderLabel};
use bevy::render::render_resource::{Buffer, BufferDescriptor, BufferUsages, Maintain, MapMode};
use bevy::render::renderer::{RenderContext, RenderDevice};

use crate::cpu::particles::ParticleColumns;
use crate::error::{SimError, SimResult};
use crate::generations::STREAM_STRIDE;
use crate::gpu::buffers::{DrawGeneration, ParticleBuffers};

/// Main world sets this for one frame to request a copy.
#[derive(Resource, Clone, Copy, Default, ExtractResource)]
pub struct AllowCopy(pub bool);

const NOTHING_COPIED: u64 = u64::MAX;

/// `MAP_READ` mirrors of position, velocity and color. Shared by both worlds.
#[derive(Resource, Clone)]
pub struct ReadbackBuffers {
    pub position: Buffer,
    pub velocity: Buffer,
    pub color: Buffer,
    pub num_particles: u32,
    copied_frames: Arc<AtomicU64>,
}

/// What the readback buffers held when mapped.
#[derive(Debug, Clone)]
pub struct GenerationSnapshot {
    /// feedback passes between the initial state and this copy
    pub completed_frames: u64,
    pub columns: ParticleColumns,
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ReadbackPassLabel;

impl ReadbackBuffers {
    pub fn new(render_device: &RenderDevice, num_particles: u32) -> Self {
        let mirror = |label: &'static str| {
            render_device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size: num_particles as u64 * STREAM_STRIDE,
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            position: mirror("readback_position"),
            velocity: mirror("readback_velocity"),
            color: mirror("readback_color"),
            num_particles,
            copied_frames: Arc::new(AtomicU64::new(NOTHING_COPIED)),
        }
    }

    /// Frame count of the last copy, if any copy happened.
    pub fn copied_frames(&self) -> Option<u64> {
        match self.copied_frames.load(Ordering::SeqCst) {
            NOTHING_COPIED => None,
            frames => Some(frames),
        }
    }

    /// Blocks on the device until all three mirrors are mapped. Call a
    /// frame or two after the copy was allowed.
    pub fn read_blocking(&self, render_device: &RenderDevice) -> SimResult<GenerationSnapshot> {
        let completed_frames = self
            .copied_frames()
            .ok_or_else(|| SimError::Readback("no generation copied yet".into()))?;
        let position = map_stream(render_device, &self.position)?;
        let velocity = map_stream(render_device, &self.velocity)?;
        let color = map_stream(render_device, &self.color)?;
        Ok(GenerationSnapshot {
            completed_frames,
            columns: columns_from_streams(&position, &velocity, &color),
        })
    }
}

fn map_stream(render_device: &RenderDevice, buffer: &Buffer) -> SimResult<Vec<[f32; 4]>> {
    let slice = buffer.slice(..);
    render_device.poll(Maintain::Wait);

    let status = Arc::new(AtomicU8::new(0));
    let cb = status.clone();
    slice.map_async(MapMode::Read, move |r| {
        cb.store(if r.is_ok() { 1 } else { 2 }, Ordering::SeqCst)
    });

    loop {
        render_device.poll(Maintain::Poll);
        match status.load(Ordering::SeqCst) {
            0 => std::thread::yield_now(),
            1 => break,
            _ => {
                buffer.unmap();
                return Err(SimError::Readback("map_async failed".into()));
            }
        }
    }

    let data = {
        let view = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, [f32; 4]>(&view).to_vec()
    };
    buffer.unmap();
    Ok(data)
}

/// Unpack GPU streams into host columns: `position.w` is seconds alive,
/// `velocity.w` is ticks alive.
pub fn columns_from_streams(
    position: &[[f32; 4]],
    velocity: &[[f32; 4]],
    color: &[[f32; 4]],
) -> ParticleColumns {
    let xyz = |v: &[f32; 4]| Vec3::new(v[0], v[1], v[2]);
    ParticleColumns {
        position: position.iter().map(xyz).collect(),
        velocity: velocity.iter().map(xyz).collect(),
        color: color.iter().map(xyz).collect(),
        age: position
            .iter()
            .zip(velocity)
            .map(|(p, v)| Vec2::new(p[3], v[3]))
            .collect(),
    }
}

/// Symmetric relative distance, as used by the parity checks.
pub fn rel_norm_sym(a: Vec3, b: Vec3) -> f32 {
    let diff = (b - a).length();
    let scale = a.length().max(b.length()).max(1e-6);
    diff / scale
}

/// Runs after the feedback node, so it copies the generation written this
/// frame.
pub struct ReadbackNode;

impl Node for ReadbackNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        if !world.get_resource::<AllowCopy>().is_some_and(|allow| allow.0) {
            return Ok(());
        }
        let (Some(readback), Some(particles), Some(buffers)) = (
            world.get_resource::<ReadbackBuffers>(),
            world.get_resource::<DrawGeneration>(),
            world.get_resource::<ParticleBuffers>(),
        ) else {
            return Ok(());
        };

        let size = readback.num_particles as u64 * STREAM_STRIDE;
        let generation = &particles.generation;
        let encoder = render_context.command_encoder();
        encoder.copy_buffer_to_buffer(&generation.position, 0, &readback.position, 0, size);
        encoder.copy_buffer_to_buffer(&generation.velocity, 0, &readback.velocity, 0, size);
        encoder.copy_buffer_to_buffer(&generation.color, 0, &readback.color, 0, size);
        readback
            .copied_frames
            .store(buffers.set.completed_frames(), Ordering::SeqCst);
        Ok(())
    }
}
