//! Clock-Drift Compensation Policy
//!
//! The capture and playback devices run on independent sample clocks, so
//! their rates differ by a small persistent amount (typically well under
//! 500 ppm of crystal drift). Left alone, the ring buffer would slowly
//! drain or fill until audio glitches. The compensator watches the buffer
//! occupancy from the playback side and nudges the consumption rate by at
//! most one frame per callback:
//!
//! - below the low watermark the consumer takes one frame fewer and pads
//!   the tail by replicating the most recent frame (stretch);
//! - between the watermarks it consumes exactly what was requested (pass);
//! - above the high watermark it discards one buffered frame before
//!   reading (compress).
//!
//! One frame per period bounds the momentary pitch perturbation to roughly
//! `1 / requested_frames` (about 0.8% at 128-frame periods), under the
//! perception threshold for speech and instrument content, while still
//! tracking several thousand ppm of drift.

/// Fill ratio below which the consumer stretches.
pub const LOW_WATERMARK: f32 = 0.25;

/// Fill ratio above which the consumer compresses.
pub const HIGH_WATERMARK: f32 = 0.75;

/// Per-callback correction selected by the compensator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftAction {
    /// Read exactly the requested frame count.
    Pass,
    /// Consume one frame fewer; replicate the last frame for the deficit.
    Stretch,
    /// Discard one buffered frame before reading.
    Compress,
}

/// Occupancy-watermark policy deciding one [`DriftAction`] per playback
/// callback.
#[derive(Debug, Clone)]
pub struct DriftCompensator {
    low: f32,
    high: f32,
}

impl DriftCompensator {
    pub fn new() -> Self {
        DriftCompensator {
            low: LOW_WATERMARK,
            high: HIGH_WATERMARK,
        }
    }

    /// Select the correction for this callback.
    ///
    /// `fill` is the occupancy ratio `available / capacity`, `available`
    /// the readable frame count, and `requested` the frames the host wants
    /// rendered. Compression additionally requires `available` to exceed
    /// `requested + 1` so discarding a frame can never cause a short read.
    #[inline]
    pub fn select(&self, fill: f32, available: usize, requested: usize) -> DriftAction {
        if fill < self.low {
            DriftAction::Stretch
        } else if fill > self.high && available > requested + 1 {
            DriftAction::Compress
        } else {
            DriftAction::Pass
        }
    }
}

impl Default for DriftCompensator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: usize = 2048;

    fn select(comp: &DriftCompensator, available: usize, requested: usize) -> DriftAction {
        comp.select(available as f32 / CAPACITY as f32, available, requested)
    }

    #[test]
    fn test_pass_at_half_fill() {
        let comp = DriftCompensator::new();
        assert_eq!(select(&comp, CAPACITY / 2, 128), DriftAction::Pass);
    }

    #[test]
    fn test_pass_at_watermarks() {
        let comp = DriftCompensator::new();
        // The boundaries themselves belong to the pass region.
        assert_eq!(select(&comp, CAPACITY / 4, 128), DriftAction::Pass);
        assert_eq!(select(&comp, CAPACITY * 3 / 4, 128), DriftAction::Pass);
    }

    #[test]
    fn test_stretch_below_low_watermark() {
        let comp = DriftCompensator::new();
        assert_eq!(select(&comp, CAPACITY / 4 - 1, 128), DriftAction::Stretch);
        assert_eq!(select(&comp, 0, 128), DriftAction::Stretch);
    }

    #[test]
    fn test_compress_above_high_watermark() {
        let comp = DriftCompensator::new();
        assert_eq!(select(&comp, CAPACITY * 3 / 4 + 1, 128), DriftAction::Compress);
        assert_eq!(select(&comp, CAPACITY, 128), DriftAction::Compress);
    }

    #[test]
    fn test_compress_needs_margin_over_request() {
        let comp = DriftCompensator::new();
        // High fill ratio but a request so large that dropping a frame
        // would cause a short read: must pass instead.
        let available = CAPACITY * 3 / 4 + 10;
        assert_eq!(select(&comp, available, available), DriftAction::Pass);
        assert_eq!(select(&comp, available, available - 1), DriftAction::Pass);
        assert_eq!(select(&comp, available, available - 2), DriftAction::Compress);
    }

    // Spec property: with equal producer/consumer rates from 50% fill,
    // the policy never corrects.
    #[test]
    fn test_steady_state_idempotence() {
        let comp = DriftCompensator::new();
        let mut available = CAPACITY / 2;
        for _ in 0..100_000 {
            available += 128; // producer period
            assert_eq!(select(&comp, available, 128), DriftAction::Pass);
            available -= 128; // consumer period
        }
    }

    // Spec property: a producer running faster than the consumer only ever
    // provokes compression; a slower producer only ever provokes stretch.
    #[test]
    fn test_positive_drift_only_compresses() {
        let comp = DriftCompensator::new();
        let mut available = CAPACITY as f64 / 2.0;
        let mut saw_compress = false;
        for _ in 0..1_000_000 {
            available += 128.128; // +0.1% producer rate
            match select(&comp, available as usize, 128) {
                DriftAction::Compress => {
                    available -= 1.0;
                    saw_compress = true;
                }
                DriftAction::Stretch => panic!("stretch under positive drift"),
                DriftAction::Pass => {}
            }
            available -= 128.0;
            assert!(available >= 0.0 && available <= CAPACITY as f64);
        }
        assert!(saw_compress);
    }

    #[test]
    fn test_negative_drift_only_stretches() {
        let comp = DriftCompensator::new();
        let mut available = CAPACITY as f64 / 2.0;
        let mut saw_stretch = false;
        for _ in 0..1_000_000 {
            available += 127.872; // -0.1% producer rate
            match select(&comp, available as usize, 128) {
                DriftAction::Stretch => {
                    // Consumer takes one frame fewer.
                    available -= 127.0;
                    saw_stretch = true;
                }
                DriftAction::Compress => panic!("compress under negative drift"),
                DriftAction::Pass => {
                    available -= 128.0;
                }
            }
            assert!(available >= 0.0 && available <= CAPACITY as f64);
        }
        assert!(saw_stretch);
    }
}
