//! Host Backend Traits
//!
//! Defines the interface every host-audio backend must provide: device
//! enumeration, format probing, and opening capture/render streams that
//! drive per-period callbacks.
//!
//! Backends deliver audio in the device's native sample format via
//! [`BlockRef`]/[`BlockMut`]; normalization to the internal f32
//! representation happens in the engine's workers. The frame count may
//! vary from one callback invocation to the next and callers must not
//! assume a fixed quantum.

use serde::{Deserialize, Serialize};

use sidetone_rt::SampleFormat;

use crate::error::HostError;

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Capture,
    Playback,
}

/// Information about an audio endpoint, as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Opaque host-assigned identifier.
    pub id: String,

    /// Human-readable device name.
    pub name: String,

    /// Whether this is the system default for its direction.
    pub is_default: bool,

    /// Native sample rate in Hz.
    pub sample_rate: u32,

    /// Channel count.
    pub channels: u16,
}

/// Host sharing mode for an opened stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareMode {
    /// Coexist with other audio applications (mixer stage in the path).
    Shared,
    /// Sole access to the device; lowest latency, blocks other clients.
    Exclusive,
}

/// Latency/stability hint passed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceProfile {
    LowLatency,
    Conservative,
}

/// Everything a backend needs to open one stream.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Endpoint id; `None` resolves the direction's default device.
    pub device_id: Option<String>,

    /// Requested processing rate in Hz.
    pub sample_rate: u32,

    /// Requested channel count.
    pub channels: u16,

    /// Requested period size in frames.
    pub period_frames: u32,

    pub share_mode: ShareMode,

    /// Buffer-size policy hint: low-latency backends pin the requested
    /// period on the device, conservative backends may let the device run
    /// at its preferred quantum.
    pub profile: PerformanceProfile,

    /// Forbid the host from inserting a sample-rate converter. When the
    /// device cannot run at the requested rate the stream opens at the
    /// device's native rate instead, and the negotiated format reports it.
    pub bypass_os_resampler: bool,

    /// Run this stream's callbacks in the pro-audio scheduling class.
    /// The engine's workers consume this flag, promoting via [`crate::rt`]
    /// on first callback entry and reverting when they observe stop.
    pub pro_audio: bool,
}

/// What the host actually granted for an opened (or probed) stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub period_frames: u32,
}

/// A borrowed block of device-native capture samples, interleaved.
///
/// `S24` carries packed little-endian three-byte samples.
pub enum BlockRef<'a> {
    U8(&'a [u8]),
    S16(&'a [i16]),
    S24(&'a [u8]),
    S32(&'a [i32]),
    F32(&'a [f32]),
}

impl<'a> BlockRef<'a> {
    pub fn sample_format(&self) -> SampleFormat {
        match self {
            BlockRef::U8(_) => SampleFormat::U8,
            BlockRef::S16(_) => SampleFormat::S16,
            BlockRef::S24(_) => SampleFormat::S24,
            BlockRef::S32(_) => SampleFormat::S32,
            BlockRef::F32(_) => SampleFormat::F32,
        }
    }

    /// Interleaved sample count in the block.
    pub fn samples(&self) -> usize {
        match self {
            BlockRef::U8(s) => s.len(),
            BlockRef::S16(s) => s.len(),
            BlockRef::S24(s) => s.len() / 3,
            BlockRef::S32(s) => s.len(),
            BlockRef::F32(s) => s.len(),
        }
    }

    pub fn frames(&self, channels: usize) -> usize {
        self.samples() / channels
    }
}

/// A borrowed block of device-native render samples to fill, interleaved.
pub enum BlockMut<'a> {
    U8(&'a mut [u8]),
    S16(&'a mut [i16]),
    S24(&'a mut [u8]),
    S32(&'a mut [i32]),
    F32(&'a mut [f32]),
}

impl<'a> BlockMut<'a> {
    pub fn sample_format(&self) -> SampleFormat {
        match self {
            BlockMut::U8(_) => SampleFormat::U8,
            BlockMut::S16(_) => SampleFormat::S16,
            BlockMut::S24(_) => SampleFormat::S24,
            BlockMut::S32(_) => SampleFormat::S32,
            BlockMut::F32(_) => SampleFormat::F32,
        }
    }

    pub fn samples(&self) -> usize {
        match self {
            BlockMut::U8(s) => s.len(),
            BlockMut::S16(s) => s.len(),
            BlockMut::S24(s) => s.len() / 3,
            BlockMut::S32(s) => s.len(),
            BlockMut::F32(s) => s.len(),
        }
    }

    pub fn frames(&self, channels: usize) -> usize {
        self.samples() / channels
    }
}

/// Per-period capture callback: `(block, frames)`.
pub type CaptureCallback = Box<dyn FnMut(BlockRef<'_>, usize) + Send + 'static>;

/// Per-period render callback: `(block, frames)`.
pub type RenderCallback = Box<dyn FnMut(BlockMut<'_>, usize) + Send + 'static>;

/// Asynchronous stream-failure callback (runs off the data path).
pub type StreamErrorCallback = Box<dyn FnMut(HostError) + Send + 'static>;

/// Control surface of one opened stream.
///
/// Dropping the handle closes the stream and releases the device.
pub trait StreamHandle {
    fn start(&mut self) -> Result<(), HostError>;

    fn stop(&mut self) -> Result<(), HostError>;

    /// The format the host granted at open time.
    fn format(&self) -> &NegotiatedFormat;
}

/// Trait for host-audio backends (cpal in production, null in tests).
///
/// Streams are not required to be `Send`; the engine opens, starts, stops,
/// and drops them from its single controller thread.
pub trait AudioHost: Send + 'static {
    type Capture: StreamHandle;
    type Render: StreamHandle;

    /// Backend name (e.g. "cpal", "null").
    fn name(&self) -> &'static str;

    /// List endpoints for one direction.
    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, HostError>;

    /// The direction's default endpoint, if any.
    fn default_device(&self, direction: Direction) -> Result<Option<DeviceInfo>, HostError>;

    /// Report what `open_*` would grant for this request, without opening.
    ///
    /// Probing is deterministic: opening the same request immediately after
    /// yields the same negotiated format.
    fn probe(
        &self,
        direction: Direction,
        request: &StreamRequest,
    ) -> Result<NegotiatedFormat, HostError>;

    /// Open a capture stream. The stream is created stopped.
    fn open_capture(
        &mut self,
        request: &StreamRequest,
        data: CaptureCallback,
        error: StreamErrorCallback,
    ) -> Result<Self::Capture, HostError>;

    /// Open a render stream. The stream is created stopped.
    fn open_render(
        &mut self,
        request: &StreamRequest,
        data: RenderCallback,
        error: StreamErrorCallback,
    ) -> Result<Self::Render, HostError>;
}
