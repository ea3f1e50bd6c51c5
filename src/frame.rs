use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::window::PrimaryWindow;

use crate::config::{CollisionSettings, ControlPanel, SimulationConfig};
use crate::error::{SimError, SimResult};

// ==================== frame parameters ===============================

/// Snapshot consumed by the feedback and render passes. Rebuilt every tick.
#[derive(Resource, Debug, Clone, PartialEq, ExtractResource)]
pub struct FrameParameters {
    pub elapsed_ticks: u64,
    pub dt: f32,
    pub gravity: Vec3,
    pub particle_color: Vec3,
    pub obstacle_size: f32,
    /// most recent pointer press, in NDC
    pub last_obstacle_pointer: Vec2,
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub collision: CollisionSettings,
}

impl Default for FrameParameters {
    fn default() -> Self {
        Self {
            elapsed_ticks: 0,
            dt: 0.0,
            gravity: Vec3::ZERO,
            particle_color: Vec3::ZERO,
            obstacle_size: 0.0,
            last_obstacle_pointer: Vec2::ZERO,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            collision: CollisionSettings::default(),
        }
    }
}

impl FrameParameters {
    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}

/// What the frame driver reads from the camera collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

impl CameraMatrices {
    pub fn from_camera(camera: &Camera, transform: &GlobalTransform) -> Self {
        Self {
            view: transform.compute_matrix().inverse(),
            projection: camera.clip_from_view(),
        }
    }
}

// ==================== frame driver ===================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
}

#[derive(Resource, Debug, Clone)]
pub struct FrameDriver {
    state: DriverState,
    elapsed_ticks: u64,
    seconds_per_tick: f32,
    collision: CollisionSettings,
    last_obstacle_pointer: Vec2,
}

impl FromWorld for FrameDriver {
    fn from_world(world: &mut World) -> Self {
        let config = world.get_resource::<SimulationConfig>().cloned().unwrap_or_default();
        Self::new(&config)
    }
}

impl FrameDriver {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            state: DriverState::Idle,
            elapsed_ticks: 0,
            seconds_per_tick: config.seconds_per_tick,
            collision: config.collision,
            last_obstacle_pointer: Vec2::ZERO,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn record_pointer(&mut self, ndc: Vec2) {
        self.last_obstacle_pointer = ndc;
    }

    /// Advance one tick and snapshot the controls and camera for this frame.
    pub fn tick(&mut self, controls: &ControlPanel, camera: CameraMatrices) -> FrameParameters {
        if self.state == DriverState::Idle {
            self.state = DriverState::Running;
            info!("frame driver running");
        }
        self.elapsed_ticks += 1;

        FrameParameters {
            elapsed_ticks: self.elapsed_ticks,
            dt: self.seconds_per_tick,
            gravity: controls.gravity_vector(),
            particle_color: controls.particle_color_linear(),
            obstacle_size: controls.obstacle_size(),
            last_obstacle_pointer: self.last_obstacle_pointer,
            view_matrix: camera.view,
            projection_matrix: camera.projection,
            collision: self.collision,
        }
    }
}

// ==================== obstacle field (host side) ======================

/// Screen pixels (origin top-left, y down) to NDC.
pub fn screen_to_ndc(screen: Vec2, viewport: Vec2) -> Vec2 {
    Vec2::new(
        2.0 * screen.x / viewport.x - 1.0,
        1.0 - 2.0 * screen.y / viewport.y,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleStamp {
    pub position_ndc: Vec2,
    /// radius in field texels
    pub size: f32,
}

/// Host handle of the occupancy field. Stamps are queued here and burned
/// into the texture at the start of the next render frame, before the
/// feedback pass reads it.
#[derive(Resource, Debug, Default)]
pub struct ObstacleField {
    size: Option<UVec2>,
    pending: Vec<ObstacleStamp>,
    disabled: bool,
}

impl ObstacleField {
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.size = Some(UVec2::new(width.max(1), height.max(1)));
    }

    pub fn size(&self) -> Option<UVec2> {
        self.size
    }

    pub fn stamp_obstacle(&mut self, position_ndc: Vec2, size: f32) -> SimResult<()> {
        if self.size.is_none() {
            return Err(SimError::StampBeforeInit {
                position: position_ndc,
            });
        }
        // nothing will ever drain the queue
        if self.disabled {
            return Ok(());
        }
        self.pending.push(ObstacleStamp { position_ndc, size });
        Ok(())
    }

    /// Stamp with the radius of the current frame snapshot, scaled from
    /// logical to physical pixels.
    pub fn stamp_with(
        &mut self,
        params: &FrameParameters,
        position_ndc: Vec2,
        scale_factor: f32,
    ) -> SimResult<()> {
        self.stamp_obstacle(position_ndc, params.obstacle_size * scale_factor)
    }

    pub fn pending(&self) -> &[ObstacleStamp] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<ObstacleStamp> {
        std::mem::take(&mut self.pending)
    }

    /// Drop queued stamps and refuse new ones; used when the GPU side failed
    /// to initialize.
    pub fn disable(&mut self) {
        self.disabled = true;
        self.pending.clear();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// Startup obstacles for a field of `size` texels, given as window fractions.
pub fn default_obstacle_stamps(
    config: &SimulationConfig,
    size: UVec2,
    radius: f32,
) -> Vec<ObstacleStamp> {
    let viewport = size.as_vec2();
    config
        .default_obstacles
        .iter()
        .map(|fraction| ObstacleStamp {
            position_ndc: screen_to_ndc(*fraction * viewport, viewport),
            size: radius,
        })
        .collect()
}

fn log_rejected(result: SimResult<()>) {
    if let Err(err) = result {
        warn!("{err}");
    }
}

// ==================== systems ========================================

/// Present once initialization failed; the simulation never starts.
#[derive(Resource, Debug, Default)]
pub struct SimulationDisabled;

pub fn simulation_enabled(disabled: Option<Res<SimulationDisabled>>) -> bool {
    disabled.is_none()
}

pub fn init_obstacle_field(
    mut field: ResMut<ObstacleField>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        warn!("no primary window; obstacle field stays uninitialized");
        return;
    };
    let width = window.physical_width();
    let height = window.physical_height();
    field.initialize(width, height);
    info!("obstacle field sized {width}x{height}");
}

// after the first tick, so the snapshot carries the obstacle size
pub fn stamp_default_obstacles(
    mut field: ResMut<ObstacleField>,
    config: Res<SimulationConfig>,
    params: Res<FrameParameters>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut done: Local<bool>,
) {
    if *done {
        return;
    }
    let (Some(size), Ok(window)) = (field.size(), windows.single()) else {
        return;
    };
    *done = true;
    let radius = params.obstacle_size * window.scale_factor();
    for stamp in default_obstacle_stamps(&config, size, radius) {
        log_rejected(field.stamp_obstacle(stamp.position_ndc, stamp.size));
    }
}

pub fn handle_pointer(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cursor_moved: EventReader<CursorMoved>,
    controls: Res<ControlPanel>,
    params: Res<FrameParameters>,
    mut field: ResMut<ObstacleField>,
    mut driver: ResMut<FrameDriver>,
) {
    let Ok(window) = windows.single() else {
        cursor_moved.clear();
        return;
    };
    let viewport = Vec2::new(window.width(), window.height());
    let scale = window.scale_factor();
    let painting = controls.camera_locked && buttons.pressed(MouseButton::Right);

    if let Some(cursor) = window.cursor_position() {
        let ndc = screen_to_ndc(cursor, viewport);
        if buttons.get_just_pressed().next().is_some() {
            driver.record_pointer(ndc);
        }
        if painting && buttons.just_pressed(MouseButton::Right) {
            log_rejected(field.stamp_with(&params, ndc, scale));
        }
    }

    for ev in cursor_moved.read() {
        if painting {
            let ndc = screen_to_ndc(ev.position, viewport);
            log_rejected(field.stamp_with(&params, ndc, scale));
        }
    }
}

pub fn drive_frame(
    mut driver: ResMut<FrameDriver>,
    controls: Res<ControlPanel>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    mut params: ResMut<FrameParameters>,
) {
    if controls.is_changed() && !controls.is_added() {
        info!(
            "controls changed: color={:?} gravity={} obstacle_size={} locked={}",
            controls.particle_color,
            controls.gravity(),
            controls.obstacle_size(),
            controls.camera_locked
        );
    }

    let camera = cameras
        .iter()
        .find(|(camera, _)| camera.is_active)
        .map(|(camera, transform)| CameraMatrices::from_camera(camera, transform))
        .unwrap_or_default();

    *params = driver.tick(&controls, camera);
}
