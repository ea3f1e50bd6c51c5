use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_particle_obstacles::camera::camera_bundle;
use bevy_particle_obstacles::{ControlPanel, ParticleSimPlugin, SimulationConfig};

// keyboard stands in for the parameter panel
const PALETTE: [[u8; 3]; 4] = [[0, 0, 255], [255, 80, 0], [0, 255, 120], [255, 255, 255]];

fn main() {
    let config = SimulationConfig::default();
    App::new()
        .add_plugins((DefaultPlugins, FrameTimeDiagnosticsPlugin::default()))
        .insert_resource(ClearColor(config.clear_color))
        .insert_resource(config)
        .add_plugins(ParticleSimPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (keyboard_controls, log_fps))
        .run();
}

fn setup(mut commands: Commands, config: Res<SimulationConfig>) {
    commands.spawn(camera_bundle(&config));
    info!(
        "controls: L lock camera, Up/Down gravity, [/] obstacle size, C color, right drag paints"
    );
}

fn keyboard_controls(
    keys: Res<ButtonInput<KeyCode>>,
    mut controls: ResMut<ControlPanel>,
    mut palette_index: Local<usize>,
) {
    if keys.just_pressed(KeyCode::KeyL) {
        controls.camera_locked = !controls.camera_locked;
    }
    if keys.just_pressed(KeyCode::ArrowUp) {
        let g = controls.gravity();
        controls.set_gravity(g + 5.0);
    }
    if keys.just_pressed(KeyCode::ArrowDown) {
        let g = controls.gravity();
        controls.set_gravity(g - 5.0);
    }
    if keys.just_pressed(KeyCode::BracketRight) {
        let size = controls.obstacle_size();
        controls.set_obstacle_size(size + 10.0);
    }
    if keys.just_pressed(KeyCode::BracketLeft) {
        let size = controls.obstacle_size();
        controls.set_obstacle_size(size - 10.0);
    }
    if keys.just_pressed(KeyCode::KeyC) {
        *palette_index = (*palette_index + 1) % PALETTE.len();
        controls.particle_color = PALETTE[*palette_index];
    }
}

fn log_fps(diagnostics: Res<DiagnosticsStore>, mut counter: Local<u32>) {
    *counter += 1;
    if *counter >= 120 {
        *counter = 0;

        if let Some(fps_diag) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(avg) = fps_diag.average() {
                info!("==== Average FPS over last ~2 s: {:.1} ====", avg);
            }
        }
    }
}
