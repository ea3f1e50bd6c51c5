// Whole-frame reference loop: stamps, feedback, swap. Mirrors the order the
// render graph records on the GPU.
use bevy::render::settings::WgpuLimits;

use crate::config::{ControlPanel, SimulationConfig};
use crate::cpu::feedback::feedback_step;
use crate::cpu::obstacle_grid::ObstacleGrid;
use crate::cpu::particles::{CpuParticles, ParticleColumns};
use crate::error::SimResult;
use crate::frame::{CameraMatrices, FrameDriver, FrameParameters, ObstacleField};

pub struct CpuSimulation {
    pub particles: CpuParticles,
    pub field: ObstacleField,
    pub grid: Option<ObstacleGrid>,
    pub driver: FrameDriver,
}

impl CpuSimulation {
    pub fn new(config: &SimulationConfig, limits: &WgpuLimits) -> SimResult<Self> {
        Ok(Self {
            particles: CpuParticles::initialize(config.num_particles, limits)?,
            field: ObstacleField::default(),
            grid: None,
            driver: FrameDriver::new(config),
        })
    }

    pub fn initialize_field(&mut self, width: u32, height: u32) {
        self.field.initialize(width, height);
        self.grid = Some(ObstacleGrid::new(width, height));
    }

    pub fn current(&self) -> &ParticleColumns {
        self.particles.current_generation()
    }

    /// Burn queued stamps into the grid. Runs at the start of a tick.
    pub fn apply_stamps(&mut self) {
        let stamps = self.field.take_pending();
        if let Some(grid) = self.grid.as_mut() {
            for stamp in stamps {
                grid.stamp(stamp.position_ndc, stamp.size);
            }
        }
    }

    pub fn step(&mut self, params: &FrameParameters) -> SimResult<()> {
        self.apply_stamps();
        let empty;
        let grid = match &self.grid {
            Some(grid) => grid,
            None => {
                empty = ObstacleGrid::new(1, 1);
                &empty
            }
        };

        self.particles.begin_frame()?;
        let (read, write, ids) = self.particles.feedback_io()?;
        feedback_step(read, write, ids, grid, params);
        self.particles.feedback_issued()?;
        self.particles.swap()
    }

    pub fn tick(
        &mut self,
        controls: &ControlPanel,
        camera: CameraMatrices,
    ) -> SimResult<FrameParameters> {
        let params = self.driver.tick(controls, camera);
        self.step(&params)?;
        Ok(params)
    }
}
