// Two particle generations with a role index: one is read (current), the
// other is written by the feedback pass. Roles flip once per frame.

use bevy::render::settings::WgpuLimits;

use crate::error::{SimError, SimResult};

pub const FEEDBACK_WORKGROUP_SIZE: u32 = 64;
/// 3 input streams + 3 output streams + shared ids. Fits the WebGPU
/// baseline of 8 storage buffers per stage.
pub const FEEDBACK_STORAGE_BUFFERS: u32 = 7;
/// quad corners + position, color instance streams
pub const DRAW_VERTEX_BUFFERS: u32 = 3;
/// every stream is stored with a 16 byte stride: xyz plus one packed lane,
/// `position.w` = seconds alive, `velocity.w` = ticks alive
pub const STREAM_STRIDE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// between frames: nothing has been issued against the write target
    Settled,
    /// a frame began; the feedback pass may write the target
    Open,
    /// the feedback pass was issued; the next step must be `swap`
    Written,
}

/// Which generation index plays which role for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlots {
    pub read: usize,
    pub write: usize,
}

#[derive(Debug)]
pub struct ParticleBufferSet<G, I> {
    generations: [G; 2],
    ids: I,
    num_particles: u32,
    current: usize,
    phase: FramePhase,
    completed_frames: u64,
}

impl<G, I> ParticleBufferSet<G, I> {
    pub(crate) fn from_parts(generations: [G; 2], ids: I, num_particles: u32) -> Self {
        Self {
            generations,
            ids,
            num_particles,
            current: 0,
            phase: FramePhase::Settled,
            completed_frames: 0,
        }
    }

    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    /// Stable ids, shared by both generations.
    pub fn ids(&self) -> &I {
        &self.ids
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Number of swaps so far, i.e. feedback passes the current generation
    /// is away from the initial state.
    pub fn completed_frames(&self) -> u64 {
        self.completed_frames
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The generation eligible for rendering.
    pub fn current_generation(&self) -> &G {
        &self.generations[self.current]
    }

    /// The complementary generation. Only the feedback pass writes it.
    pub fn write_target(&self) -> &G {
        &self.generations[1 - self.current]
    }

    pub fn begin_frame(&mut self) -> SimResult<FrameSlots> {
        if self.phase != FramePhase::Settled {
            return Err(self.out_of_order("begin_frame"));
        }
        self.phase = FramePhase::Open;
        Ok(FrameSlots {
            read: self.current,
            write: 1 - self.current,
        })
    }

    /// Split borrow for one feedback invocation: read current, write target.
    /// Never hands out the same generation twice.
    pub fn feedback_io(&mut self) -> SimResult<(&G, &mut G, &I)> {
        if self.phase != FramePhase::Open {
            return Err(self.out_of_order("feedback_io"));
        }
        let (first, second) = self.generations.split_at_mut(1);
        let (read, write) = if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };
        Ok((read, write, &self.ids))
    }

    pub fn feedback_issued(&mut self) -> SimResult<()> {
        if self.phase != FramePhase::Open {
            return Err(self.out_of_order("feedback_issued"));
        }
        self.phase = FramePhase::Written;
        Ok(())
    }

    /// Flip roles. Allowed exactly once per frame, after the feedback pass.
    pub fn swap(&mut self) -> SimResult<()> {
        if self.phase != FramePhase::Written {
            return Err(self.out_of_order("swap"));
        }
        self.current = 1 - self.current;
        self.phase = FramePhase::Settled;
        self.completed_frames += 1;
        Ok(())
    }

    fn out_of_order(&self, op: &'static str) -> SimError {
        SimError::GenerationOrder {
            op,
            phase: self.phase,
        }
    }
}

/// Ascending ids `0..n`, assigned once.
pub fn particle_ids(num_particles: u32) -> Vec<u32> {
    (0..num_particles).collect()
}

pub fn check_platform_support(limits: &WgpuLimits) -> SimResult<()> {
    if limits.max_storage_buffers_per_shader_stage < FEEDBACK_STORAGE_BUFFERS {
        return Err(SimError::UnsupportedPlatform(format!(
            "feedback pass needs {} storage buffers per stage, device offers {}",
            FEEDBACK_STORAGE_BUFFERS, limits.max_storage_buffers_per_shader_stage
        )));
    }
    if limits.max_compute_workgroup_size_x < FEEDBACK_WORKGROUP_SIZE
        || limits.max_compute_invocations_per_workgroup < FEEDBACK_WORKGROUP_SIZE
    {
        return Err(SimError::UnsupportedPlatform(format!(
            "compute workgroups of {} invocations are not available",
            FEEDBACK_WORKGROUP_SIZE
        )));
    }
    if limits.max_vertex_buffers < DRAW_VERTEX_BUFFERS {
        return Err(SimError::UnsupportedPlatform(format!(
            "instanced draw needs {} vertex buffers, device offers {}",
            DRAW_VERTEX_BUFFERS, limits.max_vertex_buffers
        )));
    }
    Ok(())
}

pub fn check_particle_count(num_particles: u32, limits: &WgpuLimits) -> SimResult<()> {
    let fail = |reason: String| SimError::Allocation {
        requested: num_particles,
        reason,
    };

    if num_particles == 0 {
        return Err(fail("particle count must be positive".into()));
    }

    let stream_bytes = num_particles as u64 * STREAM_STRIDE;
    if stream_bytes > limits.max_storage_buffer_binding_size as u64 {
        return Err(fail(format!(
            "{stream_bytes} byte stream exceeds storage binding limit of {}",
            limits.max_storage_buffer_binding_size
        )));
    }
    if stream_bytes > limits.max_buffer_size {
        return Err(fail(format!(
            "{stream_bytes} byte stream exceeds buffer limit of {}",
            limits.max_buffer_size
        )));
    }

    let workgroups = num_particles.div_ceil(FEEDBACK_WORKGROUP_SIZE);
    if workgroups > limits.max_compute_workgroups_per_dimension {
        return Err(fail(format!(
            "{workgroups} workgroups exceed dispatch limit of {}",
            limits.max_compute_workgroups_per_dimension
        )));
    }
    Ok(())
}
