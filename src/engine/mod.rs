//! Speech synthesis engines.
//!
//! A [`Synthesizer`] turns one line of text into decoded mono audio. The
//! crate ships two implementations:
//!
//! - [`PiperEngine`]: runs the `piper-tts` executable once per line
//! - [`MockEngine`]: scripted synthesizer for tests, no external process
//!
//! Engines are called from the producer thread, one line at a time. A call
//! is allowed to block for as long as synthesis takes.

mod decode;
mod mock;
mod piper;

pub use decode::decode_wav;
pub use mock::MockEngine;
pub use piper::PiperEngine;

use std::path::PathBuf;

use crate::EngineError;

/// Parameters for one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Voice model to synthesize with.
    pub voice: PathBuf,
    /// Phoneme length multiplier (`1 / speed`).
    pub length_scale: f32,
}

/// Decoded output of one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// A text-to-audio transducer.
///
/// # Implementation Notes
///
/// - `synthesize` returns `Ok(None)` when the engine succeeded but produced
///   no audio; the line is skipped silently
/// - Return [`EngineError::Failed`] for per-line rejections; any other
///   error ends the job
///
/// # Example
///
/// ```
/// use stream_speech::engine::{SynthesisRequest, SynthesizedAudio, Synthesizer};
/// use stream_speech::EngineError;
///
/// struct Beep;
///
/// impl Synthesizer for Beep {
///     fn name(&self) -> &str {
///         "beep"
///     }
///
///     fn synthesize(
///         &self,
///         text: &str,
///         _request: &SynthesisRequest,
///     ) -> Result<Option<SynthesizedAudio>, EngineError> {
///         Ok(Some(SynthesizedAudio {
///             samples: vec![0.1; text.len() * 100],
///             sample_rate: 16000,
///         }))
///     }
/// }
/// ```
pub trait Synthesizer: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Checks that a request can be served before any line is submitted.
    ///
    /// Called synchronously when a run or render starts. Default
    /// implementation accepts everything.
    fn validate(&self, _request: &SynthesisRequest) -> Result<(), EngineError> {
        Ok(())
    }

    /// Synthesizes one line of text.
    fn synthesize(
        &self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<Option<SynthesizedAudio>, EngineError>;
}
