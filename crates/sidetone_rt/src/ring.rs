//! Elastic Ring Buffer
//!
//! A wait-free single-producer / single-consumer queue of interleaved f32
//! audio frames. This is the sole synchronization point between the capture
//! and playback callbacks.
//!
//! # Design
//!
//! - Capacity is a power of two (in frames); indices are monotonically
//!   nondecreasing u64 counters masked to the buffer at access time, so they
//!   never wrap in practice and occupancy is always `write - read`.
//! - The producer advances `write_pos` with release ordering and the
//!   consumer reads it with acquire ordering (and vice versa for
//!   `read_pos`), which establishes happens-before between sample writes
//!   and the reads that observe them.
//! - `acquire_write`/`acquire_read` hand out a *contiguous* grant that is
//!   truncated at the end of the linear region. The caller copies with a
//!   straight slice copy and re-acquires for the wrapped remainder; the hot
//!   path never does per-sample modular arithmetic.
//!
//! Until a grant is committed, its contents are unobservable to the other
//! side. Committing fewer frames than granted is allowed.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Shared storage behind a [`Producer`] / [`Consumer`] pair.
///
/// The control thread may hold its own `Arc<FrameRing>` to observe fill
/// level and to reset/pre-fill between sessions. `reset` and
/// `prefill_silence` are only legal while neither audio callback is live.
pub struct FrameRing {
    storage: Box<[UnsafeCell<f32>]>,
    capacity: u64,
    channels: usize,
    write_pos: CachePadded<AtomicU64>,
    read_pos: CachePadded<AtomicU64>,
}

// The SPSC contract (exactly one producer thread, exactly one consumer
// thread, publication through the index atomics) makes the UnsafeCell
// storage safe to share.
unsafe impl Send for FrameRing {}
unsafe impl Sync for FrameRing {}

impl FrameRing {
    /// Create a ring and split it into its producer and consumer halves.
    ///
    /// `capacity_frames` must be a power of two; `channels` must be 1 or 2.
    pub fn with_capacity(capacity_frames: usize, channels: usize) -> (Producer, Consumer) {
        assert!(
            capacity_frames.is_power_of_two(),
            "ring capacity must be a power of two"
        );
        assert!(channels >= 1 && channels <= crate::MAX_CHANNELS);

        let storage: Box<[UnsafeCell<f32>]> = (0..capacity_frames * channels)
            .map(|_| UnsafeCell::new(0.0))
            .collect();

        let ring = Arc::new(FrameRing {
            storage,
            capacity: capacity_frames as u64,
            channels,
            write_pos: CachePadded::new(AtomicU64::new(0)),
            read_pos: CachePadded::new(AtomicU64::new(0)),
        });

        (
            Producer {
                ring: Arc::clone(&ring),
            },
            Consumer { ring },
        )
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Channels per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames currently readable. Safe to call from any thread.
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        (write - read) as usize
    }

    /// Frames currently writable. Safe to call from any thread.
    pub fn available_write(&self) -> usize {
        self.capacity() - self.available_read()
    }

    /// Occupancy as a ratio in [0, 1].
    pub fn fill_level(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    /// Discard all buffered frames by advancing the read index to the
    /// write index.
    ///
    /// Only legal while neither callback is running.
    pub fn reset(&self) {
        let write = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write, Ordering::Release);
    }

    /// Append `frames` frames of silence, clamped to the writable space.
    ///
    /// Only legal while neither callback is running. Used by the controller
    /// to pre-fill half the buffer before starting the devices so the
    /// under- and over-flow margins are symmetric on the first periods.
    pub fn prefill_silence(&self, frames: usize) {
        let write = self.write_pos.load(Ordering::Acquire);
        let frames = frames.min(self.available_write()) as u64;
        for i in 0..frames {
            let slot = self.frame_offset(write + i);
            for ch in 0..self.channels {
                unsafe {
                    *self.storage[slot + ch].get() = 0.0;
                }
            }
        }
        self.write_pos.store(write + frames, Ordering::Release);
    }

    #[inline]
    fn frame_offset(&self, pos: u64) -> usize {
        ((pos & (self.capacity - 1)) as usize) * self.channels
    }

    /// Frames between `pos` and the end of linear storage.
    #[inline]
    fn linear_frames(&self, pos: u64) -> usize {
        (self.capacity - (pos & (self.capacity - 1))) as usize
    }

    /// Caller must hold the producer side and stay within its granted
    /// region.
    #[inline]
    unsafe fn samples_mut(&self, pos: u64, frames: usize) -> &mut [f32] {
        let start = self.frame_offset(pos);
        let ptr = self.storage.as_ptr().add(start) as *mut f32;
        std::slice::from_raw_parts_mut(ptr, frames * self.channels)
    }

    /// Caller must hold the consumer side and stay within its granted
    /// region.
    #[inline]
    unsafe fn samples(&self, pos: u64, frames: usize) -> &[f32] {
        let start = self.frame_offset(pos);
        let ptr = self.storage.as_ptr().add(start) as *const f32;
        std::slice::from_raw_parts(ptr, frames * self.channels)
    }
}

/// Write half. Owned by the capture callback.
pub struct Producer {
    ring: Arc<FrameRing>,
}

impl Producer {
    /// Shared ring handle (for fill-level observation).
    pub fn ring(&self) -> &Arc<FrameRing> {
        &self.ring
    }

    /// Frames writable right now.
    pub fn available(&self) -> usize {
        let write = self.ring.write_pos.load(Ordering::Relaxed);
        let read = self.ring.read_pos.load(Ordering::Acquire);
        (self.ring.capacity - (write - read)) as usize
    }

    /// Acquire a contiguous write grant of up to `frames` frames.
    ///
    /// The grant length is `min(frames, available, frames-to-wrap)`; when
    /// the region would wrap, acquire again after committing to write the
    /// remainder.
    pub fn acquire_write(&mut self, frames: usize) -> WriteGrant<'_> {
        let write = self.ring.write_pos.load(Ordering::Relaxed);
        let read = self.ring.read_pos.load(Ordering::Acquire);
        let free = (self.ring.capacity - (write - read)) as usize;
        let granted = frames.min(free).min(self.ring.linear_frames(write));
        WriteGrant {
            ring: &self.ring,
            start: write,
            frames: granted,
        }
    }
}

/// Read half. Owned by the playback callback.
pub struct Consumer {
    ring: Arc<FrameRing>,
}

impl Consumer {
    /// Shared ring handle (for fill-level observation).
    pub fn ring(&self) -> &Arc<FrameRing> {
        &self.ring
    }

    /// Frames readable right now.
    pub fn available(&self) -> usize {
        let write = self.ring.write_pos.load(Ordering::Acquire);
        let read = self.ring.read_pos.load(Ordering::Relaxed);
        (write - read) as usize
    }

    /// Acquire a contiguous read grant of up to `frames` frames.
    ///
    /// Same truncate-at-wrap policy as [`Producer::acquire_write`].
    pub fn acquire_read(&mut self, frames: usize) -> ReadGrant<'_> {
        let write = self.ring.write_pos.load(Ordering::Acquire);
        let read = self.ring.read_pos.load(Ordering::Relaxed);
        let avail = (write - read) as usize;
        let granted = frames.min(avail).min(self.ring.linear_frames(read));
        ReadGrant {
            ring: &self.ring,
            start: read,
            frames: granted,
        }
    }

    /// Advance the read index past up to `frames` frames without reading
    /// them. Returns the number of frames discarded.
    pub fn skip(&mut self, frames: usize) -> usize {
        let write = self.ring.write_pos.load(Ordering::Acquire);
        let read = self.ring.read_pos.load(Ordering::Relaxed);
        let n = frames.min((write - read) as usize);
        self.ring.read_pos.store(read + n as u64, Ordering::Release);
        n
    }
}

/// A contiguous writable region. Nothing becomes visible to the consumer
/// until [`WriteGrant::commit`] runs.
pub struct WriteGrant<'a> {
    ring: &'a FrameRing,
    start: u64,
    frames: usize,
}

impl<'a> WriteGrant<'a> {
    /// Granted length in frames (may be less than requested).
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Interleaved sample slice covering the grant.
    pub fn samples(&mut self) -> &mut [f32] {
        unsafe { self.ring.samples_mut(self.start, self.frames) }
    }

    /// Publish `frames` frames (at most the granted length) with release
    /// ordering.
    pub fn commit(self, frames: usize) {
        debug_assert!(frames <= self.frames);
        self.ring
            .write_pos
            .store(self.start + frames as u64, Ordering::Release);
    }
}

/// A contiguous readable region. The frames are not consumed until
/// [`ReadGrant::commit`] runs.
pub struct ReadGrant<'a> {
    ring: &'a FrameRing,
    start: u64,
    frames: usize,
}

impl<'a> ReadGrant<'a> {
    /// Granted length in frames (may be less than requested).
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Interleaved sample slice covering the grant.
    pub fn samples(&self) -> &[f32] {
        unsafe { self.ring.samples(self.start, self.frames) }
    }

    /// Release `frames` frames (at most the granted length) back to the
    /// producer with release ordering.
    pub fn commit(self, frames: usize) {
        debug_assert!(frames <= self.frames);
        self.ring
            .read_pos
            .store(self.start + frames as u64, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn write_all(producer: &mut Producer, mut data: &[f32], channels: usize) -> usize {
        let mut written = 0;
        while !data.is_empty() {
            let mut grant = producer.acquire_write(data.len() / channels);
            let n = grant.frames();
            if n == 0 {
                break;
            }
            let samples = n * channels;
            grant.samples().copy_from_slice(&data[..samples]);
            grant.commit(n);
            data = &data[samples..];
            written += n;
        }
        written
    }

    fn read_all(consumer: &mut Consumer, out: &mut Vec<f32>, channels: usize) -> usize {
        let mut total = 0;
        loop {
            let grant = consumer.acquire_read(usize::MAX / 2 / channels);
            let n = grant.frames();
            if n == 0 {
                break;
            }
            out.extend_from_slice(grant.samples());
            grant.commit(n);
            total += n;
        }
        total
    }

    #[test]
    fn test_empty_ring() {
        let (producer, consumer) = FrameRing::with_capacity(8, 2);
        assert_eq!(producer.available(), 8);
        assert_eq!(consumer.available(), 0);
        assert_eq!(consumer.ring().fill_level(), 0.0);
    }

    #[test]
    fn test_write_then_read() {
        let (mut producer, mut consumer) = FrameRing::with_capacity(8, 2);
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(write_all(&mut producer, &data, 2), 6);
        assert_eq!(consumer.available(), 6);

        let mut out = Vec::new();
        assert_eq!(read_all(&mut consumer, &mut out, 2), 6);
        assert_eq!(out, data);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_grant_truncates_at_wrap() {
        let (mut producer, mut consumer) = FrameRing::with_capacity(8, 1);

        // Advance both indices to 6 so the next write spans the wrap.
        let data = [0.0f32; 6];
        write_all(&mut producer, &data, 1);
        consumer.skip(6);

        let grant = producer.acquire_write(4);
        assert_eq!(grant.frames(), 2); // truncated at the linear end
        grant.commit(2);
        let grant = producer.acquire_write(2);
        assert_eq!(grant.frames(), 2); // remainder after the wrap
        grant.commit(2);
        assert_eq!(consumer.available(), 4);
    }

    #[test]
    fn test_write_respects_free_space() {
        let (mut producer, _consumer) = FrameRing::with_capacity(4, 1);
        let data = [1.0f32; 4];
        assert_eq!(write_all(&mut producer, &data, 1), 4);

        let grant = producer.acquire_write(1);
        assert!(grant.is_empty());
    }

    #[test]
    fn test_uncommitted_grant_invisible() {
        let (mut producer, consumer) = FrameRing::with_capacity(8, 1);
        let mut grant = producer.acquire_write(4);
        grant.samples().fill(1.0);
        // No commit: drop the grant.
        drop(grant);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_partial_commit() {
        let (mut producer, consumer) = FrameRing::with_capacity(8, 1);
        let mut grant = producer.acquire_write(4);
        grant.samples()[..2].fill(1.0);
        grant.commit(2);
        assert_eq!(consumer.available(), 2);
    }

    #[test]
    fn test_skip() {
        let (mut producer, mut consumer) = FrameRing::with_capacity(8, 2);
        let data: Vec<f32> = (0..8).map(|i| i as f32).collect();
        write_all(&mut producer, &data, 2);

        assert_eq!(consumer.skip(1), 1);
        let mut out = Vec::new();
        read_all(&mut consumer, &mut out, 2);
        assert_eq!(out, &data[2..]);

        // Skipping an empty ring discards nothing.
        assert_eq!(consumer.skip(5), 0);
    }

    #[test]
    fn test_reset_and_prefill() {
        let (mut producer, consumer) = FrameRing::with_capacity(16, 2);
        let data = [0.5f32; 12];
        write_all(&mut producer, &data, 2);

        let ring = Arc::clone(consumer.ring());
        ring.reset();
        assert_eq!(ring.available_read(), 0);

        ring.prefill_silence(8);
        assert_eq!(ring.available_read(), 8);
        assert_eq!(ring.fill_level(), 0.5);

        let mut consumer = consumer;
        let grant = consumer.acquire_read(8);
        assert!(grant.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_prefill_clamps_to_free_space() {
        let (_producer, consumer) = FrameRing::with_capacity(8, 1);
        let ring = Arc::clone(consumer.ring());
        ring.prefill_silence(64);
        assert_eq!(ring.available_read(), 8);
    }

    // Spec property: frames read equal frames written, in order, with no
    // loss, under concurrent producer/consumer threads.
    #[test]
    fn test_concurrent_round_trip() {
        const FRAMES: usize = 100_000;
        let (mut producer, mut consumer) = FrameRing::with_capacity(256, 2);
        let ring = Arc::clone(producer.ring());

        let writer = thread::spawn(move || {
            let mut next = 0usize;
            while next < FRAMES {
                let mut grant = producer.acquire_write(64);
                let n = grant.frames();
                if n == 0 {
                    thread::yield_now();
                    continue;
                }
                let samples = grant.samples();
                for f in 0..n {
                    samples[f * 2] = (next + f) as f32;
                    samples[f * 2 + 1] = -((next + f) as f32);
                }
                grant.commit(n);
                next += n;
            }
        });

        let mut expected = 0usize;
        while expected < FRAMES {
            let grant = consumer.acquire_read(64);
            let n = grant.frames();
            if n == 0 {
                thread::yield_now();
                continue;
            }
            let samples = grant.samples();
            for f in 0..n {
                assert_eq!(samples[f * 2], (expected + f) as f32);
                assert_eq!(samples[f * 2 + 1], -((expected + f) as f32));
            }
            grant.commit(n);
            expected += n;

            // Fill bounds hold at every observable moment.
            let fill = ring.available_read();
            assert!(fill <= ring.capacity());
            assert_eq!(ring.available_write(), ring.capacity() - fill);
        }

        writer.join().unwrap();
        assert_eq!(consumer.available(), 0);
    }
}
