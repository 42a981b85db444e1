//! Audio Workers and Shared Hot-Path State
//!
//! The capture worker and playback worker are the bodies of the two host
//! callbacks. They communicate exclusively through the ring buffer; all
//! other shared state lives in [`EngineShared`] as atomics.
//!
//! # Real-Time Safety
//!
//! Both workers follow strict rules:
//! - NO heap allocations (the ring and every scratch frame are pre-sized)
//! - NO blocking operations (atomics only)
//! - NO syscalls (no logging, no I/O)
//! - O(n) time complexity where n = block frames
//!
//! The one exception is the very first callback entry, which requests
//! pro-audio scheduling from the OS; its failure latches a flag the
//! controller turns into a warning event.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use sidetone_host::{rt::RtPriorityGuard, BlockMut, BlockRef};
use sidetone_rt::{
    f32_to_s16, f32_to_s24_le, f32_to_s32, f32_to_u8, s16_to_f32, s24_le_to_f32, s32_to_f32,
    u8_to_f32, Consumer, Decimator, DriftAction, DriftCompensator, Producer, MAX_CHANNELS,
};

use crate::status::ErrorKind;

/// State shared between the audio callbacks, the controller, and the
/// public API. All fields are atomics; f32 values are stored as bits
/// because atomic floats do not exist.
pub(crate) struct EngineShared {
    /// Both callbacks short-circuit when this is false.
    pub running: AtomicBool,

    /// Gain in [0, 1], written by the shell, read once per capture
    /// callback.
    volume_bits: AtomicU32,

    /// Playback periods the ring could not fully satisfy.
    pub underruns: AtomicU64,

    /// Capture frames dropped because the ring was full.
    pub overruns: AtomicU64,

    /// Stretch + compress corrections applied.
    pub drift_corrections: AtomicU64,

    /// Classification of the most recent error (ErrorKind as u8).
    last_error: AtomicU8,

    /// Replication source for stretch padding: the most recent frame that
    /// crossed the ring (written by both workers, read by playback).
    last_frame: [AtomicU32; MAX_CHANNELS],

    /// Latched by a worker whose pro-audio promotion failed.
    pub rt_capture_failed: AtomicBool,
    pub rt_render_failed: AtomicBool,
}

impl EngineShared {
    pub fn new() -> Self {
        EngineShared {
            running: AtomicBool::new(false),
            volume_bits: AtomicU32::new(1.0_f32.to_bits()),
            underruns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            drift_corrections: AtomicU64::new(0),
            last_error: AtomicU8::new(ErrorKind::None as u8),
            last_frame: [AtomicU32::new(0), AtomicU32::new(0)],
            rt_capture_failed: AtomicBool::new(false),
            rt_render_failed: AtomicBool::new(false),
        }
    }

    /// Relaxed ordering is fine here: a value stale by one callback is
    /// acceptable and nothing else synchronizes on it.
    pub fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_last_error(&self, kind: ErrorKind) {
        self.last_error.store(kind as u8, Ordering::Relaxed);
    }

    pub fn last_error(&self) -> ErrorKind {
        ErrorKind::from_code(self.last_error.load(Ordering::Relaxed))
    }

    fn store_last_frame(&self, frame: &[f32]) {
        for (slot, &sample) in self.last_frame.iter().zip(frame) {
            slot.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    fn load_last_frame(&self, out: &mut [f32; MAX_CHANNELS]) {
        for (sample, slot) in out.iter_mut().zip(&self.last_frame) {
            *sample = f32::from_bits(slot.load(Ordering::Relaxed));
        }
    }

    /// Zero counters, the error field, and the replication register for a
    /// fresh start.
    pub fn reset_session_stats(&self) {
        self.underruns.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.drift_corrections.store(0, Ordering::Relaxed);
        self.last_error.store(ErrorKind::None as u8, Ordering::Relaxed);
        for slot in &self.last_frame {
            slot.store(0.0_f32.to_bits(), Ordering::Relaxed);
        }
    }
}

/// First-callback pro-audio promotion latch, per worker.
struct RtState {
    attempted: bool,
    guard: Option<RtPriorityGuard>,
}

impl RtState {
    fn new() -> Self {
        RtState {
            attempted: false,
            guard: None,
        }
    }

    /// Promote once per running span; latch `failed_flag` on failure.
    fn ensure(&mut self, enabled: bool, failed_flag: &AtomicBool) {
        if self.attempted || !enabled {
            return;
        }
        self.attempted = true;
        match sidetone_host::rt::promote_current_thread() {
            Ok(guard) => self.guard = Some(guard),
            Err(_) => failed_flag.store(true, Ordering::Relaxed),
        }
    }

    /// Revert when the worker observes stop; re-arms for the next start.
    fn release(&mut self) {
        self.guard = None;
        self.attempted = false;
    }
}

/// Read one normalized frame out of a device-native block.
#[inline]
fn read_frame(block: &BlockRef<'_>, frame: usize, channels: usize, out: &mut [f32; MAX_CHANNELS]) {
    let base = frame * channels;
    match block {
        BlockRef::U8(s) => {
            for ch in 0..channels {
                out[ch] = u8_to_f32(s[base + ch]);
            }
        }
        BlockRef::S16(s) => {
            for ch in 0..channels {
                out[ch] = s16_to_f32(s[base + ch]);
            }
        }
        BlockRef::S24(s) => {
            for ch in 0..channels {
                let o = (base + ch) * 3;
                out[ch] = s24_le_to_f32([s[o], s[o + 1], s[o + 2]]);
            }
        }
        BlockRef::S32(s) => {
            for ch in 0..channels {
                out[ch] = s32_to_f32(s[base + ch]);
            }
        }
        BlockRef::F32(s) => {
            out[..channels].copy_from_slice(&s[base..base + channels]);
        }
    }
}

/// Normalize `dst.len()` samples starting at `src_offset` (in samples)
/// into the ring slice, applying the gain in the same pass.
#[inline]
fn normalize_into(block: &BlockRef<'_>, src_offset: usize, dst: &mut [f32], gain: f32) {
    let dst_len = dst.len();
    match block {
        BlockRef::U8(s) => {
            for (d, &x) in dst.iter_mut().zip(&s[src_offset..src_offset + dst_len]) {
                *d = u8_to_f32(x) * gain;
            }
        }
        BlockRef::S16(s) => {
            for (d, &x) in dst.iter_mut().zip(&s[src_offset..src_offset + dst_len]) {
                *d = s16_to_f32(x) * gain;
            }
        }
        BlockRef::S24(s) => {
            for (i, d) in dst.iter_mut().enumerate() {
                let o = (src_offset + i) * 3;
                *d = s24_le_to_f32([s[o], s[o + 1], s[o + 2]]) * gain;
            }
        }
        BlockRef::S32(s) => {
            for (d, &x) in dst.iter_mut().zip(&s[src_offset..src_offset + dst_len]) {
                *d = s32_to_f32(x) * gain;
            }
        }
        BlockRef::F32(s) => {
            for (d, &x) in dst.iter_mut().zip(&s[src_offset..src_offset + dst_len]) {
                *d = x * gain;
            }
        }
    }
}

/// Write `src.len()` internal samples into a device-native block starting
/// at `dst_offset` (in samples).
#[inline]
fn denormalize_into(block: &mut BlockMut<'_>, dst_offset: usize, src: &[f32]) {
    match block {
        BlockMut::U8(out) => {
            for (i, &x) in src.iter().enumerate() {
                out[dst_offset + i] = f32_to_u8(x);
            }
        }
        BlockMut::S16(out) => {
            for (i, &x) in src.iter().enumerate() {
                out[dst_offset + i] = f32_to_s16(x);
            }
        }
        BlockMut::S24(out) => {
            for (i, &x) in src.iter().enumerate() {
                let bytes = f32_to_s24_le(x);
                let o = (dst_offset + i) * 3;
                out[o..o + 3].copy_from_slice(&bytes);
            }
        }
        BlockMut::S32(out) => {
            for (i, &x) in src.iter().enumerate() {
                out[dst_offset + i] = f32_to_s32(x);
            }
        }
        BlockMut::F32(out) => {
            out[dst_offset..dst_offset + src.len()].copy_from_slice(src);
        }
    }
}

/// Write one frame into a device-native block.
#[inline]
fn write_frame(block: &mut BlockMut<'_>, frame: usize, channels: usize, src: &[f32]) {
    denormalize_into(block, frame * channels, &src[..channels]);
}

/// Fill `frames` frames with digital silence in the block's own format.
#[inline]
fn silence_fill(block: &mut BlockMut<'_>, frames: usize, channels: usize) {
    let samples = frames * channels;
    match block {
        BlockMut::U8(out) => out[..samples].fill(128),
        BlockMut::S16(out) => out[..samples].fill(0),
        BlockMut::S24(out) => out[..samples * 3].fill(0),
        BlockMut::S32(out) => out[..samples].fill(0),
        BlockMut::F32(out) => out[..samples].fill(0.0),
    }
}

/// Producer side of the duplex pair: normalizes each capture block and
/// writes it to the ring, applying the current gain in the same pass.
pub(crate) struct CaptureWorker {
    producer: Producer,
    shared: Arc<EngineShared>,
    decimator: Option<Decimator>,
    channels: usize,
    pro_audio: bool,
    rt: RtState,
}

impl CaptureWorker {
    pub fn new(
        producer: Producer,
        shared: Arc<EngineShared>,
        decimator: Option<Decimator>,
        channels: usize,
        pro_audio: bool,
    ) -> Self {
        CaptureWorker {
            producer,
            shared,
            decimator,
            channels,
            pro_audio,
            rt: RtState::new(),
        }
    }

    /// Host capture callback body.
    pub fn process_block(&mut self, block: BlockRef<'_>, frames: usize) {
        if !self.shared.running.load(Ordering::Relaxed) {
            self.rt.release();
            return;
        }
        self.rt.ensure(self.pro_audio, &self.shared.rt_capture_failed);

        if frames == 0 {
            return;
        }

        let gain = self.shared.volume();
        if self.decimator.is_none() {
            self.write_direct(&block, frames, gain);
        } else {
            self.write_decimated(&block, frames, gain);
        }
    }

    fn write_direct(&mut self, block: &BlockRef<'_>, frames: usize, gain: f32) {
        let channels = self.channels;
        let mut written = 0;
        while written < frames {
            let mut grant = self.producer.acquire_write(frames - written);
            let granted = grant.frames();
            if granted == 0 {
                break;
            }
            normalize_into(block, written * channels, grant.samples(), gain);
            grant.commit(granted);
            written += granted;
        }

        if written < frames {
            self.shared
                .overruns
                .fetch_add((frames - written) as u64, Ordering::Relaxed);
        }

        let mut tail = [0.0; MAX_CHANNELS];
        read_frame(block, frames - 1, channels, &mut tail);
        for sample in tail.iter_mut().take(channels) {
            *sample *= gain;
        }
        self.shared.store_last_frame(&tail[..channels]);
    }

    fn write_decimated(&mut self, block: &BlockRef<'_>, frames: usize, gain: f32) {
        let CaptureWorker {
            producer,
            shared,
            decimator,
            channels,
            ..
        } = self;
        let channels = *channels;
        let decimator = match decimator {
            Some(d) => d,
            None => return,
        };

        let mut src = 0;
        let mut frame = [0.0; MAX_CHANNELS];
        let mut tail = [0.0; MAX_CHANNELS];
        let mut emitted_any = false;
        let mut dropped = 0u64;

        while src < frames {
            let due = decimator.output_frames(frames - src);
            if due == 0 {
                // The rest of the block only feeds the accumulator.
                while src < frames {
                    read_frame(block, src, channels, &mut frame);
                    for sample in frame.iter_mut().take(channels) {
                        *sample *= gain;
                    }
                    decimator.push(&frame[..channels]);
                    src += 1;
                }
                break;
            }

            let mut grant = producer.acquire_write(due);
            let granted = grant.frames();
            if granted == 0 {
                // Ring full: the remaining input has nowhere to go.
                dropped = due as u64;
                break;
            }

            let samples = grant.samples();
            let mut filled = 0;
            while src < frames && filled < granted {
                read_frame(block, src, channels, &mut frame);
                for sample in frame.iter_mut().take(channels) {
                    *sample *= gain;
                }
                if let Some(out) = decimator.push(&frame[..channels]) {
                    samples[filled * channels..(filled + 1) * channels]
                        .copy_from_slice(&out[..channels]);
                    tail[..channels].copy_from_slice(&out[..channels]);
                    emitted_any = true;
                    filled += 1;
                }
                src += 1;
            }
            grant.commit(filled);
        }

        if dropped > 0 {
            shared.overruns.fetch_add(dropped, Ordering::Relaxed);
        }
        if emitted_any {
            shared.store_last_frame(&tail[..channels]);
        }
    }
}

/// Consumer side of the duplex pair: applies the drift policy, reads from
/// the ring, and writes device-native samples out.
pub(crate) struct PlaybackWorker {
    consumer: Consumer,
    shared: Arc<EngineShared>,
    compensator: DriftCompensator,
    channels: usize,
    capacity: usize,
    pro_audio: bool,
    rt: RtState,
}

impl PlaybackWorker {
    pub fn new(
        consumer: Consumer,
        shared: Arc<EngineShared>,
        channels: usize,
        pro_audio: bool,
    ) -> Self {
        let capacity = consumer.ring().capacity();
        PlaybackWorker {
            consumer,
            shared,
            compensator: DriftCompensator::new(),
            channels,
            capacity,
            pro_audio,
            rt: RtState::new(),
        }
    }

    /// Host render callback body. Tolerant of a variable `frames` count
    /// between invocations.
    pub fn render_block(&mut self, block: &mut BlockMut<'_>, frames: usize) {
        let channels = self.channels;

        if !self.shared.running.load(Ordering::Relaxed) {
            silence_fill(block, frames, channels);
            self.rt.release();
            return;
        }
        self.rt.ensure(self.pro_audio, &self.shared.rt_render_failed);

        if frames == 0 {
            return;
        }

        let available = self.consumer.available();
        let fill = available as f32 / self.capacity as f32;

        let mut target = frames;
        match self.compensator.select(fill, available, frames) {
            DriftAction::Pass => {}
            DriftAction::Stretch => {
                target = frames - 1;
                self.shared.drift_corrections.fetch_add(1, Ordering::Relaxed);
            }
            DriftAction::Compress => {
                self.consumer.skip(1);
                self.shared.drift_corrections.fetch_add(1, Ordering::Relaxed);
            }
        }

        if available < frames {
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }

        let mut rendered = 0;
        let mut last = [0.0; MAX_CHANNELS];
        let mut read_any = false;
        while rendered < target {
            let grant = self.consumer.acquire_read(target - rendered);
            let granted = grant.frames();
            if granted == 0 {
                break;
            }
            let samples = grant.samples();
            denormalize_into(block, rendered * channels, samples);
            last[..channels].copy_from_slice(&samples[(granted - 1) * channels..]);
            read_any = true;
            grant.commit(granted);
            rendered += granted;
        }

        if read_any {
            self.shared.store_last_frame(&last[..channels]);
        } else {
            self.shared.load_last_frame(&mut last);
        }

        // Pad any deficit by replicating the most recent frame.
        for frame in rendered..frames {
            write_frame(block, frame, channels, &last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidetone_rt::FrameRing;

    fn shared_running() -> Arc<EngineShared> {
        let shared = Arc::new(EngineShared::new());
        shared.running.store(true, Ordering::SeqCst);
        shared
    }

    fn stereo_block(frames: usize, value: f32) -> Vec<f32> {
        vec![value; frames * 2]
    }

    #[test]
    fn test_shared_state_defaults() {
        let shared = EngineShared::new();
        assert!(!shared.running.load(Ordering::SeqCst));
        assert_eq!(shared.volume(), 1.0);
        assert_eq!(shared.last_error(), ErrorKind::None);
    }

    #[test]
    fn test_shared_volume_clamps() {
        let shared = EngineShared::new();
        shared.set_volume(1.7);
        assert_eq!(shared.volume(), 1.0);
        shared.set_volume(-0.3);
        assert_eq!(shared.volume(), 0.0);
        shared.set_volume(0.25);
        assert_eq!(shared.volume(), 0.25);
    }

    #[test]
    fn test_capture_not_running_is_noop() {
        let (producer, consumer) = FrameRing::with_capacity(256, 2);
        let shared = Arc::new(EngineShared::new());
        let mut worker = CaptureWorker::new(producer, shared, None, 2, false);

        let block = stereo_block(128, 0.5);
        worker.process_block(BlockRef::F32(&block), 128);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_capture_applies_gain() {
        let (producer, mut consumer) = FrameRing::with_capacity(256, 2);
        let shared = shared_running();
        shared.set_volume(0.5);
        let mut worker = CaptureWorker::new(producer, Arc::clone(&shared), None, 2, false);

        let block = stereo_block(128, 0.8);
        worker.process_block(BlockRef::F32(&block), 128);

        assert_eq!(consumer.available(), 128);
        let grant = consumer.acquire_read(128);
        assert!(grant.samples().iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_capture_counts_overrun_remainder() {
        let (producer, consumer) = FrameRing::with_capacity(64, 2);
        let shared = shared_running();
        let mut worker = CaptureWorker::new(producer, Arc::clone(&shared), None, 2, false);

        let block = stereo_block(100, 0.1);
        worker.process_block(BlockRef::F32(&block), 100);

        assert_eq!(consumer.available(), 64);
        assert_eq!(shared.overruns.load(Ordering::SeqCst), 36);
    }

    #[test]
    fn test_capture_normalizes_s16() {
        let (producer, mut consumer) = FrameRing::with_capacity(64, 1);
        let shared = shared_running();
        let mut worker = CaptureWorker::new(producer, Arc::clone(&shared), None, 1, false);

        let block: Vec<i16> = vec![i16::MIN, 0, 16384];
        worker.process_block(BlockRef::S16(&block), 3);

        let grant = consumer.acquire_read(3);
        let samples = grant.samples();
        assert_eq!(samples[0], -1.0);
        assert_eq!(samples[1], 0.0);
        assert_eq!(samples[2], 0.5);
    }

    #[test]
    fn test_capture_decimates_by_integer_ratio() {
        let (producer, mut consumer) = FrameRing::with_capacity(64, 1);
        let shared = shared_running();
        let decimator = Decimator::new(96000, 48000, 1);
        let mut worker = CaptureWorker::new(producer, Arc::clone(&shared), decimator, 1, false);

        let block: Vec<f32> = vec![1.0, 3.0, 5.0, 7.0, 2.0, 2.0];
        worker.process_block(BlockRef::F32(&block), 6);

        assert_eq!(consumer.available(), 3);
        let grant = consumer.acquire_read(3);
        assert_eq!(grant.samples(), &[2.0, 6.0, 2.0]);
    }

    #[test]
    fn test_capture_decimation_carries_across_callbacks() {
        let (producer, mut consumer) = FrameRing::with_capacity(64, 1);
        let shared = shared_running();
        let decimator = Decimator::new(96000, 48000, 1);
        let mut worker = CaptureWorker::new(producer, Arc::clone(&shared), decimator, 1, false);

        // Odd block leaves half a window in the accumulator.
        worker.process_block(BlockRef::F32(&[2.0, 4.0, 6.0]), 3);
        assert_eq!(consumer.available(), 1);
        worker.process_block(BlockRef::F32(&[8.0]), 1);
        assert_eq!(consumer.available(), 2);

        let grant = consumer.acquire_read(2);
        assert_eq!(grant.samples(), &[3.0, 7.0]);
    }

    #[test]
    fn test_playback_not_running_renders_silence() {
        let (_producer, consumer) = FrameRing::with_capacity(256, 2);
        let shared = Arc::new(EngineShared::new());
        let mut worker = PlaybackWorker::new(consumer, shared, 2, false);

        let mut out = stereo_block(128, 0.7);
        worker.render_block(&mut BlockMut::F32(&mut out), 128);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_playback_passes_through_at_half_fill() {
        let (mut producer, consumer) = FrameRing::with_capacity(2048, 2);
        let shared = shared_running();
        let mut worker = PlaybackWorker::new(consumer, Arc::clone(&shared), 2, false);

        // Pre-fill to 50%, then write a recognizable block.
        producer.ring().prefill_silence(1024);
        let block = stereo_block(128, 0.25);
        let mut grant = producer.acquire_write(128);
        let n = grant.frames();
        grant.samples().copy_from_slice(&block[..n * 2]);
        grant.commit(n);

        let mut out = stereo_block(128, -1.0);
        worker.render_block(&mut BlockMut::F32(&mut out), 128);

        // First period returns the silent pre-fill.
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(shared.underruns.load(Ordering::SeqCst), 0);
        assert_eq!(shared.drift_corrections.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_playback_underrun_pads_with_last_frame() {
        let (mut producer, consumer) = FrameRing::with_capacity(2048, 2);
        let shared = shared_running();
        let mut worker = PlaybackWorker::new(consumer, Arc::clone(&shared), 2, false);

        // Only 4 frames available, the last one distinctive.
        let mut grant = producer.acquire_write(4);
        let samples = grant.samples();
        samples.fill(0.1);
        samples[6] = 0.9;
        samples[7] = -0.9;
        grant.commit(4);

        let mut out = stereo_block(128, 0.0);
        worker.render_block(&mut BlockMut::F32(&mut out), 128);

        assert_eq!(shared.underruns.load(Ordering::SeqCst), 1);
        // Stretch fired in the low-fill region.
        assert!(shared.drift_corrections.load(Ordering::SeqCst) >= 1);
        // The real frames come through, then the tail replicates the last
        // frame actually read.
        assert_eq!(out[0], 0.1);
        assert_eq!(out[10], 0.9);
        assert_eq!(out[254], 0.9);
        assert_eq!(out[255], -0.9);
    }

    #[test]
    fn test_playback_empty_ring_replays_register() {
        let (_producer, consumer) = FrameRing::with_capacity(2048, 2);
        let shared = shared_running();
        shared.store_last_frame(&[0.33, -0.33]);
        let mut worker = PlaybackWorker::new(consumer, Arc::clone(&shared), 2, false);

        let mut out = stereo_block(16, 0.0);
        worker.render_block(&mut BlockMut::F32(&mut out), 16);

        assert!(out
            .chunks(2)
            .all(|frame| frame[0] == 0.33 && frame[1] == -0.33));
        assert_eq!(shared.underruns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_playback_compress_discards_one_frame() {
        let (mut producer, consumer) = FrameRing::with_capacity(256, 1);
        let shared = shared_running();
        let mut worker = PlaybackWorker::new(consumer, Arc::clone(&shared), 1, false);

        // Fill above the high watermark with a ramp.
        let data: Vec<f32> = (0..250).map(|i| i as f32).collect();
        let mut written = 0;
        while written < data.len() {
            let mut grant = producer.acquire_write(data.len() - written);
            let n = grant.frames();
            grant.samples().copy_from_slice(&data[written..written + n]);
            grant.commit(n);
            written += n;
        }

        let mut out = vec![0.0f32; 16];
        worker.render_block(&mut BlockMut::F32(&mut out), 16);

        assert_eq!(shared.drift_corrections.load(Ordering::SeqCst), 1);
        assert_eq!(shared.underruns.load(Ordering::SeqCst), 0);
        // Frame 0 was discarded; output starts at 1.
        assert_eq!(out[0], 1.0);
        assert_eq!(out[15], 16.0);
    }

    #[test]
    fn test_playback_denormalizes_s16() {
        let (mut producer, consumer) = FrameRing::with_capacity(256, 1);
        let shared = shared_running();
        let mut worker = PlaybackWorker::new(consumer, Arc::clone(&shared), 1, false);

        producer.ring().prefill_silence(128);
        let mut grant = producer.acquire_write(2);
        grant.samples().copy_from_slice(&[0.5, -1.0]);
        grant.commit(2);

        let mut out = vec![7i16; 130];
        worker.render_block(&mut BlockMut::S16(&mut out), 130);
        assert_eq!(out[0], 0);
        assert_eq!(out[128], 16383); // 0.5 * 32767 truncated
        assert_eq!(out[129], -32767);
    }

    #[test]
    fn test_silence_is_format_correct() {
        let mut u8_out = vec![0u8; 8];
        silence_fill(&mut BlockMut::U8(&mut u8_out), 4, 2);
        assert!(u8_out.iter().all(|&b| b == 128));

        let mut s16_out = vec![5i16; 8];
        silence_fill(&mut BlockMut::S16(&mut s16_out), 4, 2);
        assert!(s16_out.iter().all(|&s| s == 0));
    }
}
