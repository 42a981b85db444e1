//! Sidetone Core - Duplex Transparency Audio Engine
//!
//! Captures microphone audio and renders it onto a playback device with
//! the lowest achievable shared-mode latency, tolerating the independent
//! sample clocks of the two devices.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Shell Thread                          │
//! │   commands ──▶ AudioEngine ◀── events / status snapshots    │
//! └─────────────────────────────────────────────────────────────┘
//!                        │ crossbeam-channel
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   Controller Thread: lifecycle, devices, device monitor     │
//! └─────────────────────────────────────────────────────────────┘
//!                        │ opens streams
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Capture callback ──ring buffer──▶ Playback callback        │
//! │    normalize + gain          drift-compensate + denormalize │
//! │              (zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two audio callbacks communicate exclusively through a wait-free
//! SPSC ring buffer; a drift compensator on the consumer side reconciles
//! the devices' clock domains one frame per period at most.

mod config;
mod device;
mod engine;
mod error;
mod message;
mod monitor;
mod status;
mod stream;

pub use config::EngineConfig;
pub use engine::{AudioEngine, EngineState};
pub use error::{EngineError, EngineResult};
pub use message::Event;
pub use status::{EngineStatus, ErrorKind};

// Re-export host types the shell needs for configuration and enumeration.
pub use sidetone_host::{
    AudioHost, CpalHost, DeviceInfo, Direction, NullControl, NullHost, PerformanceProfile,
    ShareMode,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let _config = EngineConfig::default();
        assert_eq!(EngineState::Uninitialized as u8, 0);
    }
}
