// Runs the GPU feedback pass for a few hundred frames with the default stamp
// and gravity, copies the current generation back, and replays the same
// frames on the host reference.

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::render::renderer::RenderDevice;
use bevy::window::PrimaryWindow;
use bevy_particle_obstacles::camera::camera_bundle;
use bevy_particle_obstacles::cpu::simulation::CpuSimulation;
use bevy_particle_obstacles::frame::{FrameParameters, ObstacleField, default_obstacle_stamps};
use bevy_particle_obstacles::gpu::readback::{AllowCopy, ReadbackBuffers, rel_norm_sym};
use bevy_particle_obstacles::{ParticleSimPlugin, SimulationConfig};

const COPY_AT_FRAME: u32 = 240;

const MAX_REL_ERR: f32 = 1e-3;
// particles grazing a field texel edge may take the other branch
const MAX_DIVERGED_FRACTION: f32 = 0.01;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(SimulationConfig::default())
        .insert_resource(AllowCopy(false))
        .add_plugins(ParticleSimPlugin)
        .add_systems(Startup, |mut commands: Commands, config: Res<SimulationConfig>| {
            commands.spawn(camera_bundle(&config));
        })
        .add_systems(Update, readback)
        .run();
}

#[allow(clippy::too_many_arguments)]
fn readback(
    mut allow_copy: ResMut<AllowCopy>,
    readback: Option<Res<ReadbackBuffers>>,
    render_device: Res<RenderDevice>,
    config: Res<SimulationConfig>,
    params: Res<FrameParameters>,
    field: Res<ObstacleField>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut exit: EventWriter<AppExit>,
    mut frame: Local<u32>,
    mut state: Local<u8>,
) {
    let Some(readback) = readback else { return };
    *frame += 1;

    match *state {
        0 => {
            if *frame >= COPY_AT_FRAME {
                allow_copy.0 = true;
                *state = 1;
            }
        }
        1 => {
            allow_copy.0 = false;
            *state = 2;
        }
        2 => {
            let snapshot = match readback.read_blocking(&render_device) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    // copy not recorded yet; try again next frame
                    warn!("{err}");
                    allow_copy.0 = true;
                    *state = 1;
                    return;
                }
            };

            let (Some(size), Ok(window)) = (field.size(), windows.single()) else {
                error!("obstacle field never sized");
                exit.write(AppExit::error());
                return;
            };

            let mut sim = CpuSimulation::new(&config, &render_device.limits())
                .expect("host reference rejected the particle count");
            sim.initialize_field(size.x, size.y);
            let radius = params.obstacle_size * window.scale_factor();
            for stamp in default_obstacle_stamps(&config, size, radius) {
                sim.field
                    .stamp_obstacle(stamp.position_ndc, stamp.size)
                    .expect("field initialized above");
            }
            for _ in 0..snapshot.completed_frames {
                sim.step(&params).expect("host reference out of order");
            }

            let cpu = sim.current();
            let gpu = &snapshot.columns;
            assert_eq!(gpu.len(), cpu.len(), "GPU/CPU particle counts differ");

            let mut max_rel_pos: f32 = 0.0;
            let mut max_rel_vel: f32 = 0.0;
            let mut max_rel_col: f32 = 0.0;
            let mut max_abs_age: f32 = 0.0;
            let mut diverged = 0usize;

            for i in 0..cpu.len() {
                let pos = rel_norm_sym(cpu.position[i], gpu.position[i]);
                let vel = rel_norm_sym(cpu.velocity[i], gpu.velocity[i]);
                let col = rel_norm_sym(cpu.color[i], gpu.color[i]);
                if pos.max(vel).max(col) > MAX_REL_ERR {
                    diverged += 1;
                    continue;
                }
                max_rel_pos = max_rel_pos.max(pos);
                max_rel_vel = max_rel_vel.max(vel);
                max_rel_col = max_rel_col.max(col);
                max_abs_age = max_abs_age.max((cpu.age[i] - gpu.age[i]).abs().max_element());
            }

            let diverged_fraction = diverged as f32 / cpu.len().max(1) as f32;
            info!(
                "{}-frame parity (GPU vs CPU):  pos max_rel = {:.2e}  |  vel max_rel = {:.2e}  |  color max_rel = {:.2e}  |  age max_abs = {:.2e}  |  diverged = {} ({:.2}%)",
                snapshot.completed_frames,
                max_rel_pos,
                max_rel_vel,
                max_rel_col,
                max_abs_age,
                diverged,
                diverged_fraction * 100.0
            );

            assert!(
                diverged_fraction <= MAX_DIVERGED_FRACTION,
                "FAIL: {:.2}% of particles diverged",
                diverged_fraction * 100.0
            );
            assert!(
                max_abs_age <= params.dt,
                "FAIL: age drifted by {max_abs_age}"
            );

            exit.write(AppExit::Success);
            *state = 3;
        }
        _ => {}
    }
}
