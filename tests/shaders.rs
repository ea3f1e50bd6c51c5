use bevy_particle_obstacles::generations::FEEDBACK_STORAGE_BUFFERS;

const FEEDBACK: &str = include_str!("../assets/shaders/particle_feedback.wgsl");
const MERGE: &str = include_str!("../assets/shaders/obstacle_merge.wgsl");
const OVERLAY: &str = include_str!("../assets/shaders/obstacle_overlay.wgsl");
const DRAW: &str = include_str!("../assets/shaders/particles_draw.wgsl");

fn bindings(source: &str) -> Vec<&str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("@group(0) @binding("))
        .collect()
}

#[test]
fn feedback_declares_the_counted_storage_buffers() {
    let storage = bindings(FEEDBACK)
        .iter()
        .filter(|line| line.contains("var<storage"))
        .count();
    assert_eq!(storage as u32, FEEDBACK_STORAGE_BUFFERS);
    // age rides in the w lanes, no separate stream
    assert!(!FEEDBACK.contains("age_in"));
}

#[test]
fn overlay_binds_the_field_like_the_merge_pass() {
    let overlay = bindings(OVERLAY);
    let merge = bindings(MERGE);
    assert_eq!(overlay.len(), 1);
    assert_eq!(merge.len(), 1);
    // same layout: one unfiltered texture at binding 0
    assert!(overlay[0].ends_with(": texture_2d<f32>;"));
    assert!(merge[0].ends_with(": texture_2d<f32>;"));
    assert!(OVERLAY.contains("@vertex") && OVERLAY.contains("@fragment"));
}

#[test]
fn draw_reads_position_and_color_instances() {
    assert!(DRAW.contains("@location(1) position: vec4<f32>"));
    assert!(DRAW.contains("@location(2) color: vec4<f32>"));
    assert!(!DRAW.contains("@location(3)"));
}
