//! WAV decoding of engine output.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::engine::SynthesizedAudio;
use crate::format::{downmix_to_mono, int_to_f32};
use crate::EngineError;

/// Decodes an in-memory WAV file into mono f32 samples.
///
/// Integer PCM of any bit depth and 32-bit float are accepted. Multi-channel
/// audio is averaged down to mono.
///
/// # Errors
///
/// Returns [`EngineError::Decode`] if the bytes are not a readable WAV file.
pub fn decode_wav(bytes: &[u8]) -> Result<SynthesizedAudio, EngineError> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| EngineError::decode(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_rate == 0 {
        return Err(EngineError::decode("sample rate is zero"));
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::decode(e.to_string()))?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| int_to_f32(s, bits)))
                .collect::<Result<_, _>>()
                .map_err(|e| EngineError::decode(e.to_string()))?
        }
    };

    tracing::trace!(
        "decoded {} samples, {}Hz/{}ch/{}bit",
        samples.len(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    Ok(SynthesizedAudio {
        samples: downmix_to_mono(samples, spec.channels),
        sample_rate: spec.sample_rate,
    })
}
