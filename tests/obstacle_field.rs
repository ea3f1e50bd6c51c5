use bevy_particle_obstacles::cpu::obstacle_grid::{EMPTY_TEXEL, ObstacleGrid, ndc_to_texel_space};
use bevy_particle_obstacles::error::SimError;
use bevy_particle_obstacles::SimulationConfig;
use bevy_particle_obstacles::frame::{
    FrameParameters, ObstacleField, ObstacleStamp, default_obstacle_stamps, screen_to_ndc,
};
use glam::{UVec2, Vec2};

fn texels(grid: &ObstacleGrid) -> Vec<[u8; 4]> {
    let size = grid.size();
    (0..size.y)
        .flat_map(|y| (0..size.x).map(move |x| (x, y)))
        .map(|(x, y)| grid.texel(x, y))
        .collect()
}

#[test]
fn new_field_is_empty() {
    let grid = ObstacleGrid::new(32, 16);
    assert_eq!(grid.size(), UVec2::new(32, 16));
    assert!(texels(&grid).iter().all(|t| *t == EMPTY_TEXEL));
    assert_eq!(grid.occupancy_at_ndc(Vec2::ZERO), 0.0);
}

#[test]
fn stamp_covers_its_center_and_nothing_far_away() {
    let mut grid = ObstacleGrid::new(64, 64);
    grid.stamp(Vec2::ZERO, 8.0);
    assert_eq!(grid.occupancy_at_ndc(Vec2::ZERO), 1.0);
    // center texel is deepest, rim is shallow
    assert!(grid.texel(32, 32)[1] > grid.texel(32 + 7, 32)[1]);
    assert_eq!(grid.occupancy_at_ndc(Vec2::new(0.9, 0.9)), 0.0);
    assert_eq!(grid.texel(0, 0), EMPTY_TEXEL);
}

#[test]
fn stamps_never_reduce_coverage() {
    let mut grid = ObstacleGrid::new(48, 48);
    grid.stamp(Vec2::new(-0.2, 0.1), 10.0);
    let before = texels(&grid);

    grid.stamp(Vec2::new(0.1, 0.0), 6.0);
    let after = texels(&grid);
    for (b, a) in before.iter().zip(&after) {
        for c in 0..4 {
            assert!(a[c] >= b[c]);
        }
    }
}

#[test]
fn stamp_order_does_not_matter() {
    let mut ab = ObstacleGrid::new(40, 30);
    ab.stamp(Vec2::new(-0.1, 0.0), 9.0);
    ab.stamp(Vec2::new(0.1, 0.05), 7.0);

    let mut ba = ObstacleGrid::new(40, 30);
    ba.stamp(Vec2::new(0.1, 0.05), 7.0);
    ba.stamp(Vec2::new(-0.1, 0.0), 9.0);

    assert_eq!(ab, ba);
}

#[test]
fn scratch_stage_leaves_the_field_alone() {
    let grid = ObstacleGrid::new(16, 16);
    let scratch = grid.draw_stamp(Vec2::ZERO, 4.0);
    assert_eq!(grid, ObstacleGrid::new(16, 16));
    assert_eq!(scratch.texel(8, 8)[0], 255);
}

#[test]
fn ndc_corners_map_to_texture_corners() {
    let size = UVec2::new(200, 100);
    assert_eq!(ndc_to_texel_space(Vec2::new(-1.0, 1.0), size), Vec2::ZERO);
    assert_eq!(ndc_to_texel_space(Vec2::new(1.0, -1.0), size), Vec2::new(200.0, 100.0));
    assert_eq!(ndc_to_texel_space(Vec2::ZERO, size), Vec2::new(100.0, 50.0));

    let viewport = Vec2::new(800.0, 600.0);
    assert_eq!(screen_to_ndc(Vec2::ZERO, viewport), Vec2::new(-1.0, 1.0));
    assert_eq!(screen_to_ndc(viewport, viewport), Vec2::new(1.0, -1.0));
    assert_eq!(screen_to_ndc(viewport * 0.5, viewport), Vec2::ZERO);
}

#[test]
fn edge_of_ndc_reads_the_last_texel() {
    let mut grid = ObstacleGrid::new(10, 10);
    grid.stamp(Vec2::new(1.0, -1.0), 2.0);
    assert_eq!(grid.occupancy_at_ndc(Vec2::new(1.0, -1.0)), 1.0);
    assert_eq!(grid.occupancy_at_ndc(Vec2::new(1.5, -1.0)), 0.0);
}

#[test]
fn stamping_before_init_is_rejected() {
    let mut field = ObstacleField::default();
    let err = field.stamp_obstacle(Vec2::new(0.25, -0.5), 30.0).unwrap_err();
    assert_eq!(
        err,
        SimError::StampBeforeInit {
            position: Vec2::new(0.25, -0.5)
        }
    );
    assert!(field.pending().is_empty());

    field.initialize(640, 480);
    field.stamp_obstacle(Vec2::ZERO, 30.0).unwrap();
    assert_eq!(field.pending().len(), 1);
    assert_eq!(field.take_pending().len(), 1);
    assert!(field.pending().is_empty());
}

#[test]
fn stamps_take_the_radius_from_the_frame_snapshot() {
    let mut field = ObstacleField::default();
    field.initialize(640, 480);
    let params = FrameParameters {
        obstacle_size: 42.0,
        ..FrameParameters::default()
    };

    field.stamp_with(&params, Vec2::new(0.5, 0.5), 2.0).unwrap();
    assert_eq!(
        field.pending(),
        &[ObstacleStamp {
            position_ndc: Vec2::new(0.5, 0.5),
            size: 84.0
        }]
    );
}

#[test]
fn default_obstacles_use_the_given_radius() {
    let config = SimulationConfig::default();
    let stamps = default_obstacle_stamps(&config, UVec2::new(800, 600), 30.0);
    assert_eq!(stamps.len(), config.default_obstacles.len());
    // window center is the NDC origin
    assert_eq!(stamps[0].position_ndc, Vec2::ZERO);
    assert_eq!(stamps[0].size, 30.0);
}

#[test]
fn disabled_field_drops_stamps() {
    let mut field = ObstacleField::default();
    field.initialize(640, 480);
    field.stamp_obstacle(Vec2::ZERO, 30.0).unwrap();
    assert_eq!(field.pending().len(), 1);

    field.disable();
    assert!(field.is_disabled());
    assert!(field.pending().is_empty());

    for _ in 0..100 {
        field.stamp_obstacle(Vec2::ZERO, 30.0).unwrap();
    }
    assert!(field.pending().is_empty());
}
