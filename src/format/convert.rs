//! Sample format and channel conversion.

/// Converts an f32 sample to i16.
///
/// Input should be in the range [-1.0, 1.0].
/// Values outside this range are clamped.
///
/// Uses × 32767 (not 32768) for symmetric scaling. This means -1.0 maps
/// to -32767 rather than -32768, losing 1 LSB at the negative extreme.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts an integer PCM sample of the given bit depth to f32.
///
/// Output is in the range [-1.0, 1.0).
#[inline]
pub fn int_to_f32(sample: i32, bits_per_sample: u16) -> f32 {
    let full_scale = (1_i64 << (bits_per_sample.clamp(1, 32) - 1)) as f32;
    sample as f32 / full_scale
}

/// Returns the samples multiplied by a gain factor.
pub fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
    samples.iter().map(|&s| s * gain).collect()
}

/// Averages interleaved multi-channel samples down to mono.
///
/// Mono input is returned unchanged. A trailing partial frame is dropped.
pub fn downmix_to_mono(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    let channels = usize::from(channels);
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
