//! Decoded audio buffers passed through the pipeline.

use std::sync::Arc;
use std::time::Duration;

/// Decoded mono PCM for one successfully synthesized line.
///
/// Frames are moved from the producer through the transfer queue to the
/// consumer; nothing else ever holds them, so the samples are owned rather
/// than shared.
///
/// # Example
///
/// ```
/// use stream_speech::AudioFrame;
/// use std::time::Duration;
///
/// let frame = AudioFrame::new(0, vec![0.0; 2205], 22050);
/// assert_eq!(frame.duration(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Index of the source line, relative to the first line of the run.
    pub source_index: usize,

    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 16000, 22050).
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Creates a new frame for the line at `source_index`.
    pub fn new(source_index: usize, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            source_index,
            samples,
            sample_rate,
        }
    }

    /// Returns the playback duration of this frame.
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples.len(), self.sample_rate)
    }

    /// Returns `true` if this frame contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The concatenated result of a render job.
///
/// Samples are stored in an `Arc<Vec<f32>>` so the buffer can be handed to
/// several sinks and to the event callback without copying.
#[derive(Debug, Clone)]
pub struct RenderedAudio {
    /// Mono samples of every successful line, in line order.
    pub samples: Arc<Vec<f32>>,

    /// Sample rate of the first successfully synthesized line.
    ///
    /// Later lines are not resampled if their rate differs.
    pub sample_rate: u32,
}

impl RenderedAudio {
    /// Creates rendered audio from a sample buffer.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    /// Returns the playback duration of the whole buffer.
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples.len(), self.sample_rate)
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn samples_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate))
}
