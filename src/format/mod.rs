//! Audio format conversion utilities.
//!
//! This module provides:
//! - Sample format conversion (integer PCM ↔ f32)
//! - Gain for playback volume
//! - Channel downmixing for mono playback

mod convert;

pub use convert::{apply_gain, downmix_to_mono, f32_to_i16, int_to_f32};
