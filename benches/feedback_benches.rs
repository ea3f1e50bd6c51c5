use bevy::render::settings::WgpuLimits;
use bevy_particle_obstacles::cpu::obstacle_grid::ObstacleGrid;
use bevy_particle_obstacles::cpu::simulation::CpuSimulation;
use bevy_particle_obstacles::frame::CameraMatrices;
use bevy_particle_obstacles::{ControlPanel, SimulationConfig};
use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Mat4, Vec2, Vec3};

fn locked_camera(config: &SimulationConfig) -> CameraMatrices {
    CameraMatrices {
        view: Mat4::look_at_rh(config.locked_eye, config.locked_target, Vec3::Y),
        projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0),
    }
}

fn bench_feedback(c: &mut Criterion) {
    let limits = WgpuLimits::default();
    let config = SimulationConfig {
        num_particles: 100_000,
        ..SimulationConfig::default()
    };
    let controls = ControlPanel::default();
    let camera = locked_camera(&config);

    let mut sim = CpuSimulation::new(&config, &limits).unwrap();
    sim.initialize_field(1280, 720);
    sim.field.stamp_obstacle(Vec2::ZERO, 60.0).unwrap();

    c.bench_function("feedback_tick_100k", |b| {
        b.iter(|| sim.tick(&controls, camera).unwrap())
    });
}

fn bench_stamp(c: &mut Criterion) {
    let mut grid = ObstacleGrid::new(1280, 720);
    c.bench_function("stamp_r30_720p", |b| b.iter(|| grid.stamp(Vec2::new(0.1, -0.2), 30.0)));
}

criterion_group!(benches, bench_feedback, bench_stamp);
criterion_main!(benches);
