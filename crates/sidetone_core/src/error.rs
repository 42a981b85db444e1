//! Engine Error Types

use thiserror::Error;

use crate::engine::EngineState;
use crate::status::ErrorKind;

/// Errors that can occur in the audio engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation `{operation}` is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("Host audio subsystem failed to initialize: {0}")]
    HostInitFailed(String),

    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),

    #[error("Failed to start device: {0}")]
    DeviceStartFailed(String),

    #[error("Allocation failed: {0}")]
    OutOfMemory(String),

    #[error("Engine controller did not respond within the deadline")]
    Unresponsive,

    #[error("Engine controller has shut down")]
    ControllerGone,
}

impl EngineError {
    /// Stable classification for the status surface.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::InvalidState { .. } => ErrorKind::InvalidState,
            EngineError::HostInitFailed(_) => ErrorKind::HostInitFailed,
            EngineError::DeviceOpenFailed(_) => ErrorKind::DeviceOpenFailed,
            EngineError::DeviceStartFailed(_) => ErrorKind::DeviceStartFailed,
            EngineError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            // A wedged device call counts as device loss.
            EngineError::Unresponsive => ErrorKind::DeviceLost,
            EngineError::ControllerGone => ErrorKind::Internal,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
