use bevy::render::settings::WgpuLimits;
use bevy_particle_obstacles::cpu::feedback::{feedback_particle, id_direction, project_to_ndc};
use bevy_particle_obstacles::cpu::obstacle_grid::ObstacleGrid;
use bevy_particle_obstacles::cpu::particles::ParticleRow;
use bevy_particle_obstacles::cpu::simulation::CpuSimulation;
use bevy_particle_obstacles::frame::{CameraMatrices, FrameParameters};
use bevy_particle_obstacles::{CollisionSettings, ControlPanel, SimulationConfig};
use glam::{Mat4, Vec2, Vec3};

fn limits() -> WgpuLimits {
    WgpuLimits::default()
}

// identity camera: NDC xy equals world xy
fn params(gravity: Vec3) -> FrameParameters {
    FrameParameters {
        dt: 1.0 / 60.0,
        gravity,
        particle_color: Vec3::new(0.0, 0.0, 1.0),
        obstacle_size: 30.0,
        ..FrameParameters::default()
    }
}

#[test]
fn resting_particle_without_gravity_stays_put() {
    let p = params(Vec3::ZERO);
    let grid = ObstacleGrid::new(8, 8);
    let row = ParticleRow {
        position: Vec3::new(0.25, -0.5, 3.0),
        ..ParticleRow::ZERO
    };

    let next = feedback_particle(row, 7, &grid, &p);
    assert_eq!(next.position, row.position);
    assert_eq!(next.velocity, Vec3::ZERO);
    assert_eq!(next.color, p.particle_color);
    assert_eq!(next.age, Vec2::new(p.dt, 1.0));

    let again = feedback_particle(next, 7, &grid, &p);
    assert_eq!(again.position, row.position);
    assert_eq!(again.age, Vec2::new(2.0 * p.dt, 2.0));
}

#[test]
fn free_fall_matches_closed_form() {
    let config = SimulationConfig {
        num_particles: 1000,
        ..SimulationConfig::default()
    };
    let mut sim = CpuSimulation::new(&config, &limits()).unwrap();
    let g = Vec3::new(0.0, 30.0, 0.0);
    let p = params(g);

    let ticks = 120;
    for _ in 0..ticks {
        sim.step(&p).unwrap();
    }

    let t = ticks as f32 * p.dt;
    let expected = 0.5 * g * t * t;
    let current = sim.current();
    assert_eq!(current.len(), 1000);
    for (i, pos) in current.position.iter().enumerate() {
        let err = (*pos - expected).length() / expected.length();
        assert!(err < 1e-3, "particle {i}: {pos} vs {expected}");
        assert_eq!(current.age[i], Vec2::new(current.age[i].x, ticks as f32));
    }
}

#[test]
fn collision_reflects_and_recolors() {
    let mut grid = ObstacleGrid::new(64, 64);
    grid.stamp(Vec2::ZERO, 10.0);

    let p = params(Vec3::new(0.0, -30.0, 0.0));
    let row = ParticleRow {
        position: Vec3::ZERO,
        velocity: Vec3::new(0.0, -5.0, 0.0),
        color: p.particle_color,
        age: Vec2::new(1.0, 60.0),
    };
    let collision = p.collision;

    let next = feedback_particle(row, 3, &grid, &p);
    assert_eq!(next.color, Vec3::new(1.0, 1.0, 0.0));
    // v' = -v * restitution + unit escape * escape_speed
    let escape = next.velocity + row.velocity * collision.restitution;
    assert!((escape.length() - collision.escape_speed).abs() < 1e-3);
    assert!((next.position - next.velocity * p.dt).length() < 1e-6);
    assert_eq!(next.age, Vec2::new(1.0 + p.dt, 61.0));
}

#[test]
fn stamp_through_the_field_collides_particles_in_view() {
    let config = SimulationConfig {
        num_particles: 256,
        ..SimulationConfig::default()
    };
    let mut sim = CpuSimulation::new(&config, &limits()).unwrap();
    sim.initialize_field(64, 64);
    // identity camera puts every particle at the NDC origin
    sim.field.stamp_obstacle(Vec2::ZERO, 10.0).unwrap();

    let p = sim
        .tick(&ControlPanel::default(), CameraMatrices::default())
        .unwrap();
    assert!(sim.field.pending().is_empty());

    let current = sim.current();
    for i in 0..current.len() {
        assert_ne!(current.velocity[i], Vec3::ZERO, "particle {i} never bounced");
        assert_eq!(current.color[i], Vec3::ONE - p.particle_color);
    }
}

#[test]
fn particles_outside_the_view_ignore_the_field() {
    let mut grid = ObstacleGrid::new(16, 16);
    for x in [-0.75, -0.25, 0.25, 0.75] {
        for y in [-0.75, -0.25, 0.25, 0.75] {
            grid.stamp(Vec2::new(x, y), 8.0);
        }
    }
    let p = params(Vec3::ZERO);
    let row = ParticleRow {
        position: Vec3::new(3.0, 0.0, 0.0),
        ..ParticleRow::ZERO
    };
    let next = feedback_particle(row, 0, &grid, &p);
    assert_eq!(next.color, p.particle_color);
    assert_eq!(next.velocity, Vec3::ZERO);
}

#[test]
fn threshold_gates_the_response() {
    let mut grid = ObstacleGrid::new(32, 32);
    grid.stamp(Vec2::ZERO, 6.0);
    let mut p = params(Vec3::ZERO);
    p.collision = CollisionSettings {
        threshold: 1.0, // red never exceeds 1
        ..CollisionSettings::default()
    };
    let next = feedback_particle(ParticleRow::ZERO, 1, &grid, &p);
    assert_eq!(next.velocity, Vec3::ZERO);
    assert_eq!(next.color, p.particle_color);
}

#[test]
fn escape_directions_are_unit_and_stable() {
    for id in [0, 1, 2, 999, u32::MAX] {
        let d = id_direction(id);
        assert!((d.length() - 1.0).abs() < 1e-5);
        assert_eq!(d, id_direction(id));
    }
    assert_ne!(id_direction(1), id_direction(2));
}

#[test]
fn points_behind_the_camera_do_not_project() {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 1000.0);
    let view_proj = proj * view;

    let ndc = project_to_ndc(view_proj, Vec3::ZERO).unwrap();
    assert!(ndc.length() < 1e-5);
    assert!(project_to_ndc(view_proj, Vec3::new(0.0, 0.0, 20.0)).is_none());
}
