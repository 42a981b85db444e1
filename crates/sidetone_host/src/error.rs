//! Host Backend Error Types

use thiserror::Error;

/// Errors from host-audio backend operations
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Host audio subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("No audio devices found")]
    NoDevices,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamStart(String),

    #[error("Failed to stop audio stream: {0}")]
    StreamStop(String),

    #[error("Device disconnected: {0}")]
    DeviceLost(String),

    #[error("Real-time scheduling not available: {0}")]
    RtUnavailable(String),
}
