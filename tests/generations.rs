use bevy::render::settings::WgpuLimits;
use bevy_particle_obstacles::cpu::particles::CpuParticles;
use bevy_particle_obstacles::cpu::simulation::CpuSimulation;
use bevy_particle_obstacles::error::SimError;
use bevy_particle_obstacles::frame::CameraMatrices;
use bevy_particle_obstacles::generations::{
    FEEDBACK_STORAGE_BUFFERS, FramePhase, check_particle_count, check_platform_support,
    particle_ids,
};
use bevy_particle_obstacles::{ControlPanel, SimulationConfig};

fn limits() -> WgpuLimits {
    WgpuLimits::default()
}

#[test]
fn ids_are_ascending_and_assigned_once() {
    let particles = CpuParticles::initialize(100, &limits()).unwrap();
    assert_eq!(particles.ids(), &particle_ids(100));
    assert!(particles.ids().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(particles.num_particles(), 100);
    assert_eq!(particles.current_generation().len(), 100);
    assert_eq!(particles.write_target().len(), 100);
}

#[test]
fn ids_survive_swaps() {
    let config = SimulationConfig {
        num_particles: 64,
        ..SimulationConfig::default()
    };
    let mut sim = CpuSimulation::new(&config, &limits()).unwrap();
    let before = sim.particles.ids().clone();
    for _ in 0..5 {
        sim.tick(&ControlPanel::default(), CameraMatrices::default())
            .unwrap();
    }
    assert_eq!(sim.particles.ids(), &before);
}

#[test]
fn one_frame_flips_roles_and_two_frames_restore_them() {
    let mut particles = CpuParticles::initialize(8, &limits()).unwrap();
    assert_eq!(particles.current_index(), 0);

    for expected in [1, 0] {
        let slots = particles.begin_frame().unwrap();
        assert_ne!(slots.read, slots.write);
        particles.feedback_issued().unwrap();
        particles.swap().unwrap();
        assert_eq!(particles.current_index(), expected);
        assert_eq!(particles.phase(), FramePhase::Settled);
    }
}

#[test]
fn written_generation_becomes_current() {
    let mut particles = CpuParticles::initialize(4, &limits()).unwrap();
    particles.begin_frame().unwrap();
    {
        let (read, write, _) = particles.feedback_io().unwrap();
        assert_eq!(read.position[0], glam::Vec3::ZERO);
        write.position[0] = glam::Vec3::new(1.0, 2.0, 3.0);
    }
    // the write target is never the rendered generation
    assert_eq!(particles.current_generation().position[0], glam::Vec3::ZERO);
    particles.feedback_issued().unwrap();
    particles.swap().unwrap();
    assert_eq!(
        particles.current_generation().position[0],
        glam::Vec3::new(1.0, 2.0, 3.0)
    );
}

#[test]
fn out_of_order_calls_are_rejected() {
    let mut particles = CpuParticles::initialize(4, &limits()).unwrap();

    assert_eq!(
        particles.swap(),
        Err(SimError::GenerationOrder {
            op: "swap",
            phase: FramePhase::Settled
        })
    );
    assert!(particles.feedback_io().is_err());
    assert!(particles.feedback_issued().is_err());

    particles.begin_frame().unwrap();
    assert!(particles.begin_frame().is_err());
    assert!(particles.swap().is_err());

    particles.feedback_issued().unwrap();
    // a second swap in the same frame is refused
    particles.swap().unwrap();
    assert!(particles.swap().is_err());
    assert_eq!(particles.current_index(), 1);
}

#[test]
fn zero_particles_is_an_allocation_error() {
    let err = CpuParticles::initialize(0, &limits()).unwrap_err();
    assert!(matches!(err, SimError::Allocation { requested: 0, .. }));
}

#[test]
fn oversized_counts_are_allocation_errors() {
    let limits = limits();
    // 65535 workgroups of 64 is the default dispatch ceiling
    assert!(check_particle_count(65_535 * 64, &limits).is_ok());
    let err = check_particle_count(5_000_000, &limits).unwrap_err();
    assert!(matches!(err, SimError::Allocation { requested: 5_000_000, .. }));

    let small = WgpuLimits {
        max_storage_buffer_binding_size: 1024,
        ..limits
    };
    assert!(check_particle_count(64, &small).is_ok());
    assert!(check_particle_count(65, &small).is_err());
}

#[test]
fn webgl2_is_unsupported() {
    let err = check_platform_support(&WgpuLimits::downlevel_webgl2_defaults()).unwrap_err();
    assert!(matches!(err, SimError::UnsupportedPlatform(_)));
    assert!(check_platform_support(&limits()).is_ok());
}

#[test]
fn feedback_bindings_fit_the_webgpu_baseline() {
    let baseline = WgpuLimits::default();
    assert!(FEEDBACK_STORAGE_BUFFERS <= baseline.max_storage_buffers_per_shader_stage);
    assert!(check_platform_support(&baseline).is_ok());

    let short = WgpuLimits {
        max_storage_buffers_per_shader_stage: FEEDBACK_STORAGE_BUFFERS - 1,
        ..baseline
    };
    assert!(matches!(
        check_platform_support(&short),
        Err(SimError::UnsupportedPlatform(_))
    ));
}

#[test]
fn completed_frames_counts_swaps_only() {
    let mut particles = CpuParticles::initialize(4, &limits()).unwrap();
    assert_eq!(particles.completed_frames(), 0);

    particles.begin_frame().unwrap();
    particles.feedback_issued().unwrap();
    assert_eq!(particles.completed_frames(), 0);
    particles.swap().unwrap();
    assert_eq!(particles.completed_frames(), 1);

    // a refused swap does not count
    assert!(particles.swap().is_err());
    assert_eq!(particles.completed_frames(), 1);
}
