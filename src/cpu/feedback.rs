// Host reference of the feedback kernel. Same arithmetic as
// assets/shaders/particle_feedback.wgsl, used by tests and benches.
use glam::{Mat4, Vec2, Vec3};

use crate::cpu::obstacle_grid::ObstacleGrid;
use crate::cpu::particles::{ParticleColumns, ParticleRow};
use crate::frame::FrameParameters;

#[inline]
pub fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[inline]
fn signed_unit(h: u32) -> f32 {
    (h & 0xffff) as f32 / 65535.0 * 2.0 - 1.0
}

/// Deterministic unit direction derived from a particle id.
pub fn id_direction(id: u32) -> Vec3 {
    let h0 = hash_u32(id);
    let h1 = hash_u32(h0);
    let h2 = hash_u32(h1);
    normalize_or(
        Vec3::new(signed_unit(h0), signed_unit(h1), signed_unit(h2)),
        Vec3::Y,
    )
}

#[inline]
fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len = v.length();
    if len > 1e-6 { v / len } else { fallback }
}

/// `None` behind the camera.
pub fn project_to_ndc(view_proj: Mat4, position: Vec3) -> Option<Vec2> {
    let clip = view_proj * position.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    Some(Vec2::new(clip.x, clip.y) / clip.w)
}

pub fn feedback_particle(
    row: ParticleRow,
    id: u32,
    field: &ObstacleGrid,
    params: &FrameParameters,
) -> ParticleRow {
    let dt = params.dt;
    let g = params.gravity;
    let collision = params.collision;
    let age = Vec2::new(row.age.x + dt, row.age.y + 1.0);

    let ndc = project_to_ndc(params.view_proj(), row.position);
    let occupancy = ndc.map_or(0.0, |ndc| field.occupancy_at_ndc(ndc));

    if occupancy > collision.threshold {
        let base = id_direction(id);
        let away = ndc.unwrap_or(Vec2::ZERO) - params.last_obstacle_pointer;
        let escape = normalize_or(base + away.extend(0.0) * collision.pointer_bias, base);
        let velocity = -row.velocity * collision.restitution + escape * collision.escape_speed;
        return ParticleRow {
            position: row.position + velocity * dt,
            velocity,
            color: Vec3::ONE - params.particle_color,
            age,
        };
    }

    ParticleRow {
        position: row.position + row.velocity * dt + 0.5 * g * dt * dt,
        velocity: row.velocity + g * dt,
        color: params.particle_color,
        age,
    }
}

/// One full pass: every row of `read` into `write`.
pub fn feedback_step(
    read: &ParticleColumns,
    write: &mut ParticleColumns,
    ids: &[u32],
    field: &ObstacleGrid,
    params: &FrameParameters,
) {
    debug_assert_eq!(read.len(), write.len());
    for (i, &id) in ids.iter().enumerate() {
        write.set_row(i, feedback_particle(read.row(i), id, field, params));
    }
}
