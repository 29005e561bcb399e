//! Configuration types for engines, playback runs, and the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::SynthesisRequest;
use crate::SpeechError;

/// Default engine executable.
pub const DEFAULT_ENGINE_PROGRAM: &str = "piper-tts";

/// Voice directory relative to the home directory.
const VOICE_DIR_FROM_HOME: &str = ".local/share/piper-voices";

/// Returns the default directory where voice models are stored.
///
/// This is `~/.local/share/piper-voices`, or `None` if the home directory
/// cannot be determined.
pub fn default_voice_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(VOICE_DIR_FROM_HOME))
}

/// How to invoke the external synthesis engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine executable, looked up on `PATH` if not absolute.
    ///
    /// Default: `piper-tts`
    pub program: PathBuf,

    /// Directory scanned for voice models.
    ///
    /// Default: `~/.local/share/piper-voices`
    pub voice_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENGINE_PROGRAM),
            voice_dir: default_voice_dir(),
        }
    }
}

/// Settings read once when a playback run or render job starts.
///
/// Changing them has no effect on a run in progress; stop (or pause) and
/// start (or resume) again to apply new values.
///
/// # Example
///
/// ```
/// use stream_speech::PlaybackSettings;
///
/// let settings = PlaybackSettings::new("/voices/en_US-amy-medium.onnx")
///     .with_speed(1.5)
///     .with_volume(0.8);
/// assert!(settings.validate().is_ok());
/// assert!((settings.length_scale() - 1.0 / 1.5).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    /// Path of the voice model passed to the engine.
    pub voice: PathBuf,

    /// Speaking rate multiplier. Must be positive.
    ///
    /// Default: 1.0
    pub speed: f32,

    /// Output gain in `[0.0, 1.0]`. Not applied to rendered audio.
    ///
    /// Default: 1.0
    pub volume: f32,
}

impl PlaybackSettings {
    /// Creates settings for the given voice at normal speed and full volume.
    pub fn new(voice: impl AsRef<Path>) -> Self {
        Self {
            voice: voice.as_ref().to_path_buf(),
            speed: 1.0,
            volume: 1.0,
        }
    }

    /// Sets the speed factor.
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Sets the volume factor.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Returns the engine length scale, the inverse of the speed.
    #[must_use]
    pub fn length_scale(&self) -> f32 {
        1.0 / self.speed
    }

    /// Checks that the settings can be used for a run.
    ///
    /// # Errors
    ///
    /// Returns `NoVoiceSelected`, `InvalidSpeed` or `InvalidVolume`.
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.voice.as_os_str().is_empty() {
            return Err(SpeechError::NoVoiceSelected);
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SpeechError::InvalidSpeed { speed: self.speed });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(SpeechError::InvalidVolume {
                volume: self.volume,
            });
        }
        Ok(())
    }

    /// Builds the per-line engine request for these settings.
    pub(crate) fn request(&self) -> SynthesisRequest {
        SynthesisRequest {
            voice: self.voice.clone(),
            length_scale: self.length_scale(),
        }
    }
}

/// Converts a speed slider position (tenths, 5..=20) into a speed factor.
///
/// # Example
///
/// ```
/// assert_eq!(stream_speech::speed_from_slider(15), 1.5);
/// ```
#[must_use]
pub fn speed_from_slider(position: u8) -> f32 {
    f32::from(position.clamp(5, 20)) / 10.0
}

/// Converts a volume percentage (0..=100) into a volume factor.
#[must_use]
pub fn volume_from_percent(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Configuration for pipeline behavior.
///
/// Use [`PipelineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_speech::PipelineConfig;
///
/// let config = PipelineConfig {
///     queue_capacity: Some(2),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of synthesized lines waiting for playback.
    ///
    /// `None` lets the producer run ahead without limit; `Some(n)` blocks
    /// the producer once `n` frames are queued.
    /// Default: `None`
    pub queue_capacity: Option<usize>,

    /// Amount of audio the device ring buffer holds ahead of playback.
    ///
    /// Default: 250ms
    pub output_buffer: Duration,

    /// How long a blocked device write sleeps before retrying.
    ///
    /// Default: 5ms
    pub write_poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            output_buffer: Duration::from_millis(250),
            write_poll_interval: Duration::from_millis(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = PlaybackSettings::new("voice.onnx");
        assert_eq!(settings.speed, 1.0);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.length_scale(), 1.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_length_scale_is_inverse_speed() {
        let settings = PlaybackSettings::new("voice.onnx").with_speed(2.0);
        assert_eq!(settings.length_scale(), 0.5);
        assert_eq!(settings.request().length_scale, 0.5);
    }

    #[test]
    fn test_validate_rejects_bad_speed() {
        for speed in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let settings = PlaybackSettings::new("voice.onnx").with_speed(speed);
            assert!(matches!(
                settings.validate(),
                Err(SpeechError::InvalidSpeed { .. })
            ));
        }
    }

    #[test]
    fn test_validate_rejects_bad_volume() {
        let settings = PlaybackSettings::new("voice.onnx").with_volume(1.01);
        assert!(matches!(
            settings.validate(),
            Err(SpeechError::InvalidVolume { .. })
        ));
    }

    #[test]
    fn test_validate_requires_voice() {
        let settings = PlaybackSettings::new("");
        assert!(matches!(
            settings.validate(),
            Err(SpeechError::NoVoiceSelected)
        ));
    }

    #[test]
    fn test_slider_conversions() {
        assert_eq!(speed_from_slider(10), 1.0);
        assert_eq!(speed_from_slider(5), 0.5);
        assert_eq!(speed_from_slider(0), 0.5);
        assert_eq!(speed_from_slider(40), 2.0);
        assert_eq!(volume_from_percent(100), 1.0);
        assert_eq!(volume_from_percent(150), 1.0);
        assert_eq!(volume_from_percent(0), 0.0);
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.output_buffer, Duration::from_millis(250));
        assert_eq!(config.write_poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_engine_config_default_program() {
        let config = EngineConfig::default();
        assert_eq!(config.program, PathBuf::from("piper-tts"));
    }
}
