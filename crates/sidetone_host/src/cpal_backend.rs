//! CPAL Host Backend
//!
//! Production backend over the `cpal` crate. Devices are identified by
//! name (cpal exposes no separate id), the default-device flag comes from
//! comparing against the host's default endpoint, and streams are built
//! in the device's negotiated sample format.
//!
//! cpal never inserts a sample-rate converter, so `bypass_os_resampler`
//! is inherently honored: when the requested rate is unsupported the
//! stream opens at the device's preferred rate and the negotiated format
//! reports it. The performance profile selects the buffer-size policy:
//! low-latency pins the requested period on the device, conservative lets
//! the device run at its preferred quantum. Exclusive share mode is not
//! available through cpal and is reported as an unsupported configuration.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig, SupportedStreamConfigRange};
use tracing::{debug, warn};

use sidetone_rt::SampleFormat;

use crate::error::HostError;
use crate::traits::{
    AudioHost, BlockMut, BlockRef, CaptureCallback, DeviceInfo, Direction, NegotiatedFormat,
    PerformanceProfile, RenderCallback, ShareMode, StreamHandle, StreamRequest,
    StreamErrorCallback,
};

/// Backend over the platform's default cpal host.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        CpalHost {
            host: cpal::default_host(),
        }
    }

    fn find_device(
        &self,
        direction: Direction,
        id: Option<&str>,
    ) -> Result<cpal::Device, HostError> {
        match id {
            None => self.cpal_default(direction).ok_or(HostError::NoDevices),
            Some(id) => {
                let devices = self.cpal_devices(direction)?;
                for device in devices {
                    if device.name().map(|n| n == id).unwrap_or(false) {
                        return Ok(device);
                    }
                }
                Err(HostError::DeviceNotFound(id.to_string()))
            }
        }
    }

    fn cpal_default(&self, direction: Direction) -> Option<cpal::Device> {
        match direction {
            Direction::Capture => self.host.default_input_device(),
            Direction::Playback => self.host.default_output_device(),
        }
    }

    fn cpal_devices(&self, direction: Direction) -> Result<Vec<cpal::Device>, HostError> {
        let devices = match direction {
            Direction::Capture => self.host.input_devices(),
            Direction::Playback => self.host.output_devices(),
        };
        devices
            .map(|iter| iter.collect())
            .map_err(|e| HostError::Unavailable(e.to_string()))
    }

    fn supported_configs(
        device: &cpal::Device,
        direction: Direction,
    ) -> Result<Vec<SupportedStreamConfigRange>, HostError> {
        let configs: Result<Vec<_>, _> = match direction {
            Direction::Capture => device.supported_input_configs().map(|c| c.collect()),
            Direction::Playback => device.supported_output_configs().map(|c| c.collect()),
        };
        configs.map_err(|e| HostError::UnsupportedConfig(e.to_string()))
    }

    /// Select the config range and rate `open_*` will use for `request`.
    fn negotiate(
        device: &cpal::Device,
        direction: Direction,
        request: &StreamRequest,
    ) -> Result<NegotiatedFormat, HostError> {
        if request.share_mode == ShareMode::Exclusive {
            return Err(HostError::UnsupportedConfig(
                "exclusive mode is not available through cpal".into(),
            ));
        }

        let configs = Self::supported_configs(device, direction)?;
        if configs.is_empty() {
            return Err(HostError::UnsupportedConfig(
                "device reports no stream configurations".into(),
            ));
        }

        let rate_fits = |c: &SupportedStreamConfigRange| {
            request.sample_rate >= c.min_sample_rate().0
                && request.sample_rate <= c.max_sample_rate().0
        };
        let channel_fits = |c: &SupportedStreamConfigRange| c.channels() == request.channels;
        let format_known = |c: &SupportedStreamConfigRange| map_sample_format(c.sample_format());

        // Prefer an exact match on channels and rate with a format we can
        // normalize, f32 first; otherwise fall back to the device's
        // preferred rate at the requested channel count.
        let exact = configs
            .iter()
            .filter(|c| channel_fits(c) && rate_fits(c) && format_known(c).is_some())
            .max_by_key(|c| (c.sample_format() == cpal::SampleFormat::F32) as u8);

        if let Some(config) = exact {
            return Ok(NegotiatedFormat {
                sample_format: format_known(config).unwrap_or(SampleFormat::F32),
                sample_rate: request.sample_rate,
                channels: request.channels,
                period_frames: request.period_frames,
            });
        }

        let fallback = configs
            .iter()
            .filter(|c| channel_fits(c) && format_known(c).is_some())
            .max_by_key(|c| c.max_sample_rate().0)
            .ok_or_else(|| {
                HostError::UnsupportedConfig(format!(
                    "no {}-channel configuration with a supported sample format",
                    request.channels
                ))
            })?;

        let native_rate = fallback.max_sample_rate().0;
        warn!(
            requested = request.sample_rate,
            native = native_rate,
            "device does not support requested rate, opening at native rate"
        );

        Ok(NegotiatedFormat {
            sample_format: format_known(fallback).unwrap_or(SampleFormat::F32),
            sample_rate: native_rate,
            channels: request.channels,
            period_frames: request.period_frames,
        })
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

/// The negotiated `period_frames` stays the nominal estimate either way;
/// the workers tolerate whatever block sizes the device actually delivers.
fn buffer_size_for(request: &StreamRequest) -> BufferSize {
    match request.profile {
        PerformanceProfile::LowLatency => BufferSize::Fixed(request.period_frames),
        PerformanceProfile::Conservative => BufferSize::Default,
    }
}

fn map_sample_format(format: cpal::SampleFormat) -> Option<SampleFormat> {
    match format {
        cpal::SampleFormat::U8 => Some(SampleFormat::U8),
        cpal::SampleFormat::I16 => Some(SampleFormat::S16),
        cpal::SampleFormat::I32 => Some(SampleFormat::S32),
        cpal::SampleFormat::F32 => Some(SampleFormat::F32),
        _ => None,
    }
}

fn map_stream_error(err: cpal::StreamError) -> HostError {
    match err {
        cpal::StreamError::DeviceNotAvailable => HostError::DeviceLost(String::new()),
        cpal::StreamError::BackendSpecific { err } => HostError::Unavailable(err.to_string()),
    }
}

fn device_info(
    device: &cpal::Device,
    direction: Direction,
    default_name: Option<&str>,
) -> Result<DeviceInfo, HostError> {
    let name = device
        .name()
        .map_err(|e| HostError::Unavailable(e.to_string()))?;

    let (sample_rate, channels) = match direction {
        Direction::Capture => device
            .default_input_config()
            .map(|c| (c.sample_rate().0, c.channels()))
            .unwrap_or((0, 0)),
        Direction::Playback => device
            .default_output_config()
            .map(|c| (c.sample_rate().0, c.channels()))
            .unwrap_or((0, 0)),
    };

    Ok(DeviceInfo {
        // cpal provides no separate id; the name serves as the opaque id.
        id: name.clone(),
        is_default: default_name.map(|d| d == name).unwrap_or(false),
        name,
        sample_rate,
        channels,
    })
}

/// An opened cpal stream plus the format it was granted.
pub struct CpalStream {
    stream: cpal::Stream,
    format: NegotiatedFormat,
}

impl StreamHandle for CpalStream {
    fn start(&mut self) -> Result<(), HostError> {
        self.stream
            .play()
            .map_err(|e| HostError::StreamStart(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), HostError> {
        self.stream
            .pause()
            .map_err(|e| HostError::StreamStop(e.to_string()))
    }

    fn format(&self) -> &NegotiatedFormat {
        &self.format
    }
}

impl AudioHost for CpalHost {
    type Capture = CpalStream;
    type Render = CpalStream;

    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, HostError> {
        let default_name = self.cpal_default(direction).and_then(|d| d.name().ok());

        let mut infos = Vec::new();
        for device in self.cpal_devices(direction)? {
            match device_info(&device, direction, default_name.as_deref()) {
                Ok(info) => infos.push(info),
                Err(e) => debug!("skipping unreadable device: {e}"),
            }
        }
        Ok(infos)
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceInfo>, HostError> {
        match self.cpal_default(direction) {
            None => Ok(None),
            Some(device) => {
                let name = device.name().ok();
                device_info(&device, direction, name.as_deref()).map(Some)
            }
        }
    }

    fn probe(
        &self,
        direction: Direction,
        request: &StreamRequest,
    ) -> Result<NegotiatedFormat, HostError> {
        let device = self.find_device(direction, request.device_id.as_deref())?;
        Self::negotiate(&device, direction, request)
    }

    fn open_capture(
        &mut self,
        request: &StreamRequest,
        mut data: CaptureCallback,
        mut error: StreamErrorCallback,
    ) -> Result<Self::Capture, HostError> {
        let device = self.find_device(Direction::Capture, request.device_id.as_deref())?;
        let format = Self::negotiate(&device, Direction::Capture, request)?;
        let channels = format.channels as usize;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: buffer_size_for(request),
        };

        let err_cb = move |e: cpal::StreamError| error(map_stream_error(e));

        let stream = match format.sample_format {
            SampleFormat::U8 => device.build_input_stream(
                &config,
                move |buf: &[u8], _: &cpal::InputCallbackInfo| {
                    data(BlockRef::U8(buf), buf.len() / channels)
                },
                err_cb,
                None,
            ),
            SampleFormat::S16 => device.build_input_stream(
                &config,
                move |buf: &[i16], _: &cpal::InputCallbackInfo| {
                    data(BlockRef::S16(buf), buf.len() / channels)
                },
                err_cb,
                None,
            ),
            SampleFormat::S32 => device.build_input_stream(
                &config,
                move |buf: &[i32], _: &cpal::InputCallbackInfo| {
                    data(BlockRef::S32(buf), buf.len() / channels)
                },
                err_cb,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |buf: &[f32], _: &cpal::InputCallbackInfo| {
                    data(BlockRef::F32(buf), buf.len() / channels)
                },
                err_cb,
                None,
            ),
            SampleFormat::S24 => {
                return Err(HostError::UnsupportedConfig(
                    "packed 24-bit is not available through cpal".into(),
                ))
            }
        }
        .map_err(|e| HostError::StreamBuild(e.to_string()))?;

        Ok(CpalStream { stream, format })
    }

    fn open_render(
        &mut self,
        request: &StreamRequest,
        mut data: RenderCallback,
        mut error: StreamErrorCallback,
    ) -> Result<Self::Render, HostError> {
        let device = self.find_device(Direction::Playback, request.device_id.as_deref())?;
        let format = Self::negotiate(&device, Direction::Playback, request)?;
        let channels = format.channels as usize;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: buffer_size_for(request),
        };

        let err_cb = move |e: cpal::StreamError| error(map_stream_error(e));

        let stream = match format.sample_format {
            SampleFormat::U8 => device.build_output_stream(
                &config,
                move |buf: &mut [u8], _: &cpal::OutputCallbackInfo| {
                    let frames = buf.len() / channels;
                    data(BlockMut::U8(buf), frames)
                },
                err_cb,
                None,
            ),
            SampleFormat::S16 => device.build_output_stream(
                &config,
                move |buf: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let frames = buf.len() / channels;
                    data(BlockMut::S16(buf), frames)
                },
                err_cb,
                None,
            ),
            SampleFormat::S32 => device.build_output_stream(
                &config,
                move |buf: &mut [i32], _: &cpal::OutputCallbackInfo| {
                    let frames = buf.len() / channels;
                    data(BlockMut::S32(buf), frames)
                },
                err_cb,
                None,
            ),
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |buf: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = buf.len() / channels;
                    data(BlockMut::F32(buf), frames)
                },
                err_cb,
                None,
            ),
            SampleFormat::S24 => {
                return Err(HostError::UnsupportedConfig(
                    "packed 24-bit is not available through cpal".into(),
                ))
            }
        }
        .map_err(|e| HostError::StreamBuild(e.to_string()))?;

        Ok(CpalStream { stream, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_selects_buffer_size() {
        let mut request = StreamRequest {
            device_id: None,
            sample_rate: 48000,
            channels: 2,
            period_frames: 128,
            share_mode: ShareMode::Shared,
            profile: PerformanceProfile::LowLatency,
            bypass_os_resampler: true,
            pro_audio: true,
        };
        assert!(matches!(buffer_size_for(&request), BufferSize::Fixed(128)));

        request.profile = PerformanceProfile::Conservative;
        assert!(matches!(buffer_size_for(&request), BufferSize::Default));
    }

    #[test]
    fn test_sample_format_mapping() {
        assert_eq!(
            map_sample_format(cpal::SampleFormat::F32),
            Some(SampleFormat::F32)
        );
        assert_eq!(
            map_sample_format(cpal::SampleFormat::I16),
            Some(SampleFormat::S16)
        );
        assert_eq!(map_sample_format(cpal::SampleFormat::I64), None);
    }

    // Hardware-dependent tests are marked with #[ignore].
    // Run them with: cargo test -- --ignored

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_enumerate_devices() {
        let host = CpalHost::new();
        let outputs = host.list_devices(Direction::Playback);
        assert!(outputs.is_ok());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_probe_default_output() {
        let host = CpalHost::new();
        let request = StreamRequest {
            device_id: None,
            sample_rate: 48000,
            channels: 2,
            period_frames: 128,
            share_mode: ShareMode::Shared,
            profile: crate::traits::PerformanceProfile::LowLatency,
            bypass_os_resampler: true,
            pro_audio: true,
        };
        let negotiated = host.probe(Direction::Playback, &request);
        if let Ok(format) = negotiated {
            assert_eq!(format.channels, 2);
            assert!(format.sample_rate > 0);
        }
    }
}
