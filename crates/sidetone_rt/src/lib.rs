//! Sidetone RT - Wait-Free Hot-Path Primitives
//!
//! This crate provides the real-time building blocks for the sidetone
//! duplex engine:
//! - Elastic ring buffer (SPSC, wait-free) carrying interleaved f32 frames
//! - Sample format normalization between device-native formats and f32
//! - Integer-ratio decimation for capture devices running above the
//!   internal rate
//! - Clock-drift compensation policy for the playback side
//!
//! # Architecture
//!
//! Everything in this crate follows a strict "no allocation, no locks in
//! the audio callback" rule. The ring buffer's index pair is the only
//! cross-thread state; all other types are plain values owned by a single
//! audio thread.

mod drift;
mod ring;
mod sample;

pub use drift::{DriftAction, DriftCompensator, HIGH_WATERMARK, LOW_WATERMARK};
pub use ring::{Consumer, FrameRing, Producer, ReadGrant, WriteGrant};
pub use sample::{
    f32_to_s16, f32_to_s24_le, f32_to_s32, f32_to_u8, s16_to_f32, s24_le_to_f32, s32_to_f32,
    u8_to_f32, Decimator, SampleFormat,
};

/// Maximum channel count the hot path supports (mono or stereo).
pub const MAX_CHANNELS: usize = 2;
