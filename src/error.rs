use glam::Vec2;
use thiserror::Error;

use crate::generations::FramePhase;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// GPU buffer or texture creation would exceed device limits. Fatal at init.
    #[error("cannot allocate {requested} particles: {reason}")]
    Allocation { requested: u32, reason: String },

    /// A required GPU capability is missing. Fatal at startup.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Recoverable: the stamp is dropped and the frame loop continues.
    #[error("obstacle stamp at {position} ignored: obstacle field is not initialized")]
    StampBeforeInit { position: Vec2 },

    #[error("`{op}` called while particle generations are {phase:?}")]
    GenerationOrder { op: &'static str, phase: FramePhase },

    #[error("particle readback failed: {0}")]
    Readback(String),
}

pub type SimResult<T> = Result<T, SimError>;
