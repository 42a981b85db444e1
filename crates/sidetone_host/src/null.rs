//! Null Host Backend
//!
//! A backend with no OS audio behind it. Devices, negotiated formats, and
//! callback invocations are controlled through a cloneable [`NullControl`]
//! handle, which makes the engine's full behavior drivable from tests and
//! usable on headless systems.
//!
//! The control handle stands in for the OS audio service: `feed_capture_*`
//! plays the role of a capture period arriving, `render_*` the role of a
//! playback period being requested, and `fail_*` the role of an
//! asynchronous device failure. Streams negotiate the owning device's
//! native sample rate and the per-direction wire format configured on the
//! control handle.

use std::sync::{Arc, Mutex};

use sidetone_rt::SampleFormat;

use crate::error::HostError;
use crate::traits::{
    AudioHost, BlockMut, BlockRef, CaptureCallback, DeviceInfo, Direction, NegotiatedFormat,
    RenderCallback, StreamHandle, StreamRequest, StreamErrorCallback,
};

struct NullStreamState {
    data: StreamData,
    error: StreamErrorCallback,
    started: bool,
}

enum StreamData {
    Capture(CaptureCallback),
    Render(RenderCallback),
}

#[derive(Default)]
struct NullShared {
    capture_devices: Vec<DeviceInfo>,
    playback_devices: Vec<DeviceInfo>,
    capture_format: Option<SampleFormat>,
    render_format: Option<SampleFormat>,
    capture: Option<NullStreamState>,
    render: Option<NullStreamState>,
}

impl NullShared {
    fn devices(&self, direction: Direction) -> &Vec<DeviceInfo> {
        match direction {
            Direction::Capture => &self.capture_devices,
            Direction::Playback => &self.playback_devices,
        }
    }

    fn resolve(&self, direction: Direction, id: Option<&str>) -> Result<DeviceInfo, HostError> {
        let devices = self.devices(direction);
        match id {
            Some(id) => devices
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(|| HostError::DeviceNotFound(id.to_string())),
            None => devices
                .iter()
                .find(|d| d.is_default)
                .or_else(|| devices.first())
                .cloned()
                .ok_or(HostError::NoDevices),
        }
    }

    fn negotiate(
        &self,
        direction: Direction,
        request: &StreamRequest,
    ) -> Result<NegotiatedFormat, HostError> {
        let device = self.resolve(direction, request.device_id.as_deref())?;
        let wire_format = match direction {
            Direction::Capture => self.capture_format,
            Direction::Playback => self.render_format,
        };
        Ok(NegotiatedFormat {
            sample_format: wire_format.unwrap_or(SampleFormat::F32),
            // The null device always runs at its native rate, like a
            // shared-mode stream with the OS resampler bypassed.
            sample_rate: device.sample_rate,
            channels: request.channels,
            period_frames: request.period_frames,
        })
    }
}

/// The backend half; hand this to the engine.
pub struct NullHost {
    shared: Arc<Mutex<NullShared>>,
}

impl NullHost {
    /// Create a backend with one default capture and one default playback
    /// device, both at 48 kHz stereo.
    pub fn new() -> (Self, NullControl) {
        let (host, control) = Self::empty();
        control.add_capture_device(DeviceInfo {
            id: "null-mic".to_string(),
            name: "Null Microphone".to_string(),
            is_default: true,
            sample_rate: 48000,
            channels: 2,
        });
        control.add_playback_device(DeviceInfo {
            id: "null-out".to_string(),
            name: "Null Speakers".to_string(),
            is_default: true,
            sample_rate: 48000,
            channels: 2,
        });
        (host, control)
    }

    /// Create a backend with no devices.
    pub fn empty() -> (Self, NullControl) {
        let shared = Arc::new(Mutex::new(NullShared::default()));
        (
            NullHost {
                shared: Arc::clone(&shared),
            },
            NullControl { shared },
        )
    }
}

/// Test/driver half: mutates the device list and pumps the callbacks.
#[derive(Clone)]
pub struct NullControl {
    shared: Arc<Mutex<NullShared>>,
}

impl NullControl {
    pub fn add_capture_device(&self, info: DeviceInfo) {
        self.shared.lock().unwrap().capture_devices.push(info);
    }

    pub fn add_playback_device(&self, info: DeviceInfo) {
        self.shared.lock().unwrap().playback_devices.push(info);
    }

    /// Remove a device from both direction lists.
    pub fn remove_device(&self, id: &str) {
        let mut shared = self.shared.lock().unwrap();
        shared.capture_devices.retain(|d| d.id != id);
        shared.playback_devices.retain(|d| d.id != id);
    }

    /// Set the wire format future capture streams will negotiate.
    pub fn set_capture_wire_format(&self, format: SampleFormat) {
        self.shared.lock().unwrap().capture_format = Some(format);
    }

    /// Set the wire format future render streams will negotiate.
    pub fn set_render_wire_format(&self, format: SampleFormat) {
        self.shared.lock().unwrap().render_format = Some(format);
    }

    pub fn capture_open(&self) -> bool {
        self.shared.lock().unwrap().capture.is_some()
    }

    pub fn render_open(&self) -> bool {
        self.shared.lock().unwrap().render.is_some()
    }

    pub fn capture_started(&self) -> bool {
        self.shared
            .lock()
            .unwrap()
            .capture
            .as_ref()
            .map(|s| s.started)
            .unwrap_or(false)
    }

    pub fn render_started(&self) -> bool {
        self.shared
            .lock()
            .unwrap()
            .render
            .as_ref()
            .map(|s| s.started)
            .unwrap_or(false)
    }

    fn feed_capture(&self, block: BlockRef<'_>, frames: usize) -> bool {
        let mut shared = self.shared.lock().unwrap();
        match shared.capture.as_mut() {
            Some(state) if state.started => {
                if let StreamData::Capture(cb) = &mut state.data {
                    cb(block, frames);
                }
                true
            }
            _ => false,
        }
    }

    /// Deliver one capture period of f32 samples. Returns false if no
    /// started capture stream exists.
    pub fn feed_capture_f32(&self, samples: &[f32], channels: usize) -> bool {
        self.feed_capture(BlockRef::F32(samples), samples.len() / channels)
    }

    pub fn feed_capture_s16(&self, samples: &[i16], channels: usize) -> bool {
        self.feed_capture(BlockRef::S16(samples), samples.len() / channels)
    }

    pub fn feed_capture_u8(&self, samples: &[u8], channels: usize) -> bool {
        self.feed_capture(BlockRef::U8(samples), samples.len() / channels)
    }

    pub fn feed_capture_s24(&self, bytes: &[u8], channels: usize) -> bool {
        self.feed_capture(BlockRef::S24(bytes), bytes.len() / 3 / channels)
    }

    pub fn feed_capture_s32(&self, samples: &[i32], channels: usize) -> bool {
        self.feed_capture(BlockRef::S32(samples), samples.len() / channels)
    }

    fn pull_render(&self, block: BlockMut<'_>, frames: usize) -> bool {
        let mut shared = self.shared.lock().unwrap();
        match shared.render.as_mut() {
            Some(state) if state.started => {
                if let StreamData::Render(cb) = &mut state.data {
                    cb(block, frames);
                }
                true
            }
            _ => false,
        }
    }

    /// Request one render period into an f32 buffer. Returns false if no
    /// started render stream exists.
    pub fn render_f32(&self, out: &mut [f32], channels: usize) -> bool {
        let frames = out.len() / channels;
        self.pull_render(BlockMut::F32(out), frames)
    }

    pub fn render_s16(&self, out: &mut [i16], channels: usize) -> bool {
        let frames = out.len() / channels;
        self.pull_render(BlockMut::S16(out), frames)
    }

    /// Raise an asynchronous failure on the capture stream.
    pub fn fail_capture(&self, err: HostError) {
        let mut shared = self.shared.lock().unwrap();
        if let Some(state) = shared.capture.as_mut() {
            (state.error)(err);
        }
    }

    /// Raise an asynchronous failure on the render stream.
    pub fn fail_render(&self, err: HostError) {
        let mut shared = self.shared.lock().unwrap();
        if let Some(state) = shared.render.as_mut() {
            (state.error)(err);
        }
    }
}

/// Handle to an opened null stream.
pub struct NullStream {
    shared: Arc<Mutex<NullShared>>,
    direction: Direction,
    format: NegotiatedFormat,
}

impl NullStream {
    fn set_started(&self, started: bool) {
        let mut shared = self.shared.lock().unwrap();
        let state = match self.direction {
            Direction::Capture => shared.capture.as_mut(),
            Direction::Playback => shared.render.as_mut(),
        };
        if let Some(state) = state {
            state.started = started;
        }
    }
}

impl StreamHandle for NullStream {
    fn start(&mut self) -> Result<(), HostError> {
        self.set_started(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HostError> {
        self.set_started(false);
        Ok(())
    }

    fn format(&self) -> &NegotiatedFormat {
        &self.format
    }
}

impl Drop for NullStream {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        match self.direction {
            Direction::Capture => shared.capture = None,
            Direction::Playback => shared.render = None,
        }
    }
}

impl AudioHost for NullHost {
    type Capture = NullStream;
    type Render = NullStream;

    fn name(&self) -> &'static str {
        "null"
    }

    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, HostError> {
        Ok(self.shared.lock().unwrap().devices(direction).clone())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceInfo>, HostError> {
        let shared = self.shared.lock().unwrap();
        Ok(shared
            .devices(direction)
            .iter()
            .find(|d| d.is_default)
            .cloned())
    }

    fn probe(
        &self,
        direction: Direction,
        request: &StreamRequest,
    ) -> Result<NegotiatedFormat, HostError> {
        self.shared.lock().unwrap().negotiate(direction, request)
    }

    fn open_capture(
        &mut self,
        request: &StreamRequest,
        data: CaptureCallback,
        error: StreamErrorCallback,
    ) -> Result<Self::Capture, HostError> {
        let mut shared = self.shared.lock().unwrap();
        let format = shared.negotiate(Direction::Capture, request)?;
        shared.capture = Some(NullStreamState {
            data: StreamData::Capture(data),
            error,
            started: false,
        });
        Ok(NullStream {
            shared: Arc::clone(&self.shared),
            direction: Direction::Capture,
            format,
        })
    }

    fn open_render(
        &mut self,
        request: &StreamRequest,
        data: RenderCallback,
        error: StreamErrorCallback,
    ) -> Result<Self::Render, HostError> {
        let mut shared = self.shared.lock().unwrap();
        let format = shared.negotiate(Direction::Playback, request)?;
        shared.render = Some(NullStreamState {
            data: StreamData::Render(data),
            error,
            started: false,
        });
        Ok(NullStream {
            shared: Arc::clone(&self.shared),
            direction: Direction::Playback,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PerformanceProfile;
    use crate::traits::ShareMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> StreamRequest {
        StreamRequest {
            device_id: None,
            sample_rate: 48000,
            channels: 2,
            period_frames: 128,
            share_mode: ShareMode::Shared,
            profile: PerformanceProfile::LowLatency,
            bypass_os_resampler: true,
            pro_audio: false,
        }
    }

    #[test]
    fn test_default_devices() {
        let (host, _control) = NullHost::new();
        let inputs = host.list_devices(Direction::Capture).unwrap();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].is_default);

        let default = host.default_device(Direction::Playback).unwrap().unwrap();
        assert_eq!(default.id, "null-out");
    }

    #[test]
    fn test_empty_host_has_no_devices() {
        let (host, _control) = NullHost::empty();
        assert!(host.list_devices(Direction::Capture).unwrap().is_empty());

        let err = host.probe(Direction::Capture, &request()).unwrap_err();
        assert!(matches!(err, HostError::NoDevices));
    }

    #[test]
    fn test_negotiates_device_native_rate() {
        let (host, control) = NullHost::empty();
        control.add_capture_device(DeviceInfo {
            id: "hi-rate".to_string(),
            name: "96k Mic".to_string(),
            is_default: true,
            sample_rate: 96000,
            channels: 2,
        });

        let format = host.probe(Direction::Capture, &request()).unwrap();
        assert_eq!(format.sample_rate, 96000);
        assert_eq!(format.sample_format, SampleFormat::F32);
    }

    #[test]
    fn test_feed_requires_started_stream() {
        let (mut host, control) = NullHost::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = Arc::clone(&counter);

        let mut stream = host
            .open_capture(
                &request(),
                Box::new(move |block, frames| {
                    assert_eq!(block.frames(2), frames);
                    counter_cb.fetch_add(frames, Ordering::SeqCst);
                }),
                Box::new(|_| {}),
            )
            .unwrap();

        let block = [0.0f32; 256];
        assert!(!control.feed_capture_f32(&block, 2));

        stream.start().unwrap();
        assert!(control.feed_capture_f32(&block, 2));
        assert_eq!(counter.load(Ordering::SeqCst), 128);

        stream.stop().unwrap();
        assert!(!control.feed_capture_f32(&block, 2));
    }

    #[test]
    fn test_drop_closes_stream() {
        let (mut host, control) = NullHost::new();
        let stream = host
            .open_render(&request(), Box::new(|_, _| {}), Box::new(|_| {}))
            .unwrap();
        assert!(control.render_open());
        drop(stream);
        assert!(!control.render_open());
    }

    #[test]
    fn test_device_not_found() {
        let (host, _control) = NullHost::new();
        let mut req = request();
        req.device_id = Some("bogus".to_string());
        let err = host.probe(Direction::Capture, &req).unwrap_err();
        assert!(matches!(err, HostError::DeviceNotFound(_)));
    }
}
