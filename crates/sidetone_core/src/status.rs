//! Engine Status Snapshot
//!
//! Read-only view the shell renders. Counters are mutated atomically by
//! the audio workers and read here without synchronization beyond the
//! atomics themselves.

use serde::{Deserialize, Serialize};

/// Stable error classification, compact enough to live in an atomic byte
/// for the workers' last-error field.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    None = 0,
    InvalidArgument = 1,
    InvalidState = 2,
    HostInitFailed = 3,
    DeviceOpenFailed = 4,
    DeviceStartFailed = 5,
    OutOfMemory = 6,
    DeviceLost = 7,
    Internal = 8,
}

impl ErrorKind {
    pub(crate) fn from_code(code: u8) -> ErrorKind {
        match code {
            1 => ErrorKind::InvalidArgument,
            2 => ErrorKind::InvalidState,
            3 => ErrorKind::HostInitFailed,
            4 => ErrorKind::DeviceOpenFailed,
            5 => ErrorKind::DeviceStartFailed,
            6 => ErrorKind::OutOfMemory,
            7 => ErrorKind::DeviceLost,
            8 => ErrorKind::Internal,
            _ => ErrorKind::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::None => "none",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::HostInitFailed => "host init failed",
            ErrorKind::DeviceOpenFailed => "device open failed",
            ErrorKind::DeviceStartFailed => "device start failed",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::DeviceLost => "device lost",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Snapshot of the engine's observable state, assembled on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether both streams are live.
    pub running: bool,

    /// Ring buffer occupancy in [0, 1].
    pub fill_level: f32,

    /// Estimated round-trip latency in milliseconds:
    /// `(fill_frames + period_frames) / sample_rate`.
    pub latency_ms: f32,

    /// Capture-leg latency (one period at the capture rate).
    pub capture_latency_ms: f32,

    /// Playback-leg latency (one period at the playback rate).
    pub playback_latency_ms: f32,

    /// Playback periods the buffer could not fully satisfy.
    pub underruns: u64,

    /// Capture frames dropped because the buffer was full.
    pub overruns: u64,

    /// Stretch and compress corrections applied.
    pub drift_corrections: u64,

    /// Current gain in [0, 1].
    pub volume: f32,

    /// Classification of the most recent error, `None` if healthy.
    pub last_error: ErrorKind,
}

impl EngineStatus {
    pub(crate) fn idle(volume: f32, last_error: ErrorKind) -> Self {
        EngineStatus {
            running: false,
            fill_level: 0.0,
            latency_ms: 0.0,
            capture_latency_ms: 0.0,
            playback_latency_ms: 0.0,
            underruns: 0,
            overruns: 0,
            drift_corrections: 0,
            volume,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_round_trip() {
        for kind in [
            ErrorKind::None,
            ErrorKind::InvalidArgument,
            ErrorKind::InvalidState,
            ErrorKind::HostInitFailed,
            ErrorKind::DeviceOpenFailed,
            ErrorKind::DeviceStartFailed,
            ErrorKind::OutOfMemory,
            ErrorKind::DeviceLost,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_code(kind as u8), kind);
        }
    }

    #[test]
    fn test_unknown_code_is_none() {
        assert_eq!(ErrorKind::from_code(200), ErrorKind::None);
    }

    #[test]
    fn test_status_serialization() {
        let status = EngineStatus::idle(0.8, ErrorKind::None);
        let json = serde_json::to_string(&status).unwrap();
        let back: EngineStatus = serde_json::from_str(&json).unwrap();
        assert!(!back.running);
        assert_eq!(back.volume, 0.8);
        assert_eq!(back.last_error, ErrorKind::None);
    }
}
