// Host-side mirror of one particle generation (structure of arrays).
use bevy::render::settings::WgpuLimits;
use glam::{Vec2, Vec3};

use crate::error::SimResult;
use crate::generations::{ParticleBufferSet, check_particle_count, particle_ids};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleRow {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec3,
    pub age: Vec2, // (seconds alive, ticks alive)
}

impl ParticleRow {
    pub const ZERO: Self = Self {
        position: Vec3::ZERO,
        velocity: Vec3::ZERO,
        color: Vec3::ZERO,
        age: Vec2::ZERO,
    };
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleColumns {
    pub position: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    pub color: Vec<Vec3>,
    pub age: Vec<Vec2>,
}

impl ParticleColumns {
    pub fn zeroed(n: usize) -> Self {
        Self {
            position: vec![Vec3::ZERO; n],
            velocity: vec![Vec3::ZERO; n],
            color: vec![Vec3::ZERO; n],
            age: vec![Vec2::ZERO; n],
        }
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn row(&self, i: usize) -> ParticleRow {
        ParticleRow {
            position: self.position[i],
            velocity: self.velocity[i],
            color: self.color[i],
            age: self.age[i],
        }
    }

    pub fn set_row(&mut self, i: usize, row: ParticleRow) {
        self.position[i] = row.position;
        self.velocity[i] = row.velocity;
        self.color[i] = row.color;
        self.age[i] = row.age;
    }
}

pub type CpuParticles = ParticleBufferSet<ParticleColumns, Vec<u32>>;

impl ParticleBufferSet<ParticleColumns, Vec<u32>> {
    /// Both generations zeroed; ids `0..n` in index order.
    pub fn initialize(num_particles: u32, limits: &WgpuLimits) -> SimResult<Self> {
        check_particle_count(num_particles, limits)?;
        let n = num_particles as usize;
        Ok(Self::from_parts(
            [ParticleColumns::zeroed(n), ParticleColumns::zeroed(n)],
            particle_ids(num_particles),
            num_particles,
        ))
    }
}
