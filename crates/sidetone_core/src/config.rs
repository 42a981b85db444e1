//! Engine Configuration

use serde::{Deserialize, Serialize};

use sidetone_host::{PerformanceProfile, ShareMode};

/// Everything the engine needs for one session. Immutable once
/// `initialize` accepts it; changing anything requires a full
/// uninitialize/initialize cycle. The volume field is only the *initial*
/// gain; it can be changed live afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capture endpoint id; `None` selects the default input device.
    pub input_device: Option<String>,

    /// Playback endpoint id; `None` selects the default output device.
    pub output_device: Option<String>,

    /// Internal processing rate in Hz.
    pub sample_rate: u32,

    /// Channel count (1 = mono, 2 = stereo).
    pub channels: u16,

    /// Requested period size in frames (lower = less latency).
    pub period_frames: u32,

    /// Ring buffer capacity in frames; rounded up to a power of two.
    pub ring_buffer_frames: usize,

    /// Host sharing mode for both devices.
    pub share_mode: ShareMode,

    /// Latency/stability hint passed to the host.
    pub profile: PerformanceProfile,

    /// Forbid the host from inserting a sample-rate converter; required
    /// for the sub-10 ms shared-mode fast path.
    pub bypass_os_resampler: bool,

    /// Initial gain in [0, 1].
    pub volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: 48000,
            channels: 2,
            period_frames: 128,
            ring_buffer_frames: 2048,
            share_mode: ShareMode::Shared,
            profile: PerformanceProfile::LowLatency,
            bypass_os_resampler: true,
            volume: 1.0,
        }
    }
}

impl EngineConfig {
    /// Config optimized for the lowest latency (~2.6 ms periods at 48 kHz).
    pub fn low_latency() -> Self {
        Self {
            period_frames: 128,
            profile: PerformanceProfile::LowLatency,
            ..Self::default()
        }
    }

    /// Config trading a little latency for stability on busy systems.
    pub fn conservative() -> Self {
        Self {
            period_frames: 256,
            ring_buffer_frames: 4096,
            profile: PerformanceProfile::Conservative,
            ..Self::default()
        }
    }

    /// One period of latency at the internal rate, in milliseconds.
    pub fn period_latency_ms(&self) -> f32 {
        (self.period_frames as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels as usize > sidetone_rt::MAX_CHANNELS {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.period_frames < 32 || self.period_frames > 8192 {
            return Err(format!("Invalid period size: {}", self.period_frames));
        }
        if self.ring_buffer_frames < self.period_frames as usize * 2 {
            return Err(format!(
                "Ring buffer of {} frames cannot hold two {}-frame periods",
                self.ring_buffer_frames, self.period_frames
            ));
        }
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("Invalid volume: {}", self.volume));
        }
        Ok(())
    }
}
