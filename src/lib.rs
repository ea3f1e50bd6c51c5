pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod generations;

pub mod cpu {
    pub mod feedback;
    pub mod obstacle_grid;
    pub mod particles;
    pub mod simulation;
}

pub mod gpu {
    pub mod buffers;
    pub mod draw_buffers;
    pub mod draw_pass;
    pub mod draw_pipeline;
    pub mod ffi;
    pub mod obstacle;
    pub mod obstacle_overlay;
    pub mod pipeline;
    pub mod readback;
}

pub use config::{CollisionSettings, ControlPanel, SimulationConfig};
pub use error::{SimError, SimResult};
pub use gpu::buffers::ParticleSimPlugin;
