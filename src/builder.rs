//! Builder pattern for `StreamSpeech`.

use std::sync::Arc;

use crate::engine::{PiperEngine, Synthesizer};
use crate::output::{AudioOutput, CpalOutput};
use crate::session::Session;
use crate::{
    event_callback, EngineConfig, EventCallback, PipelineConfig, PipelineEvent, SpeechError,
    VoiceCatalog,
};

/// Specifies which audio output device to play on.
#[derive(Debug, Clone, Default)]
pub(crate) enum DeviceSelection {
    /// Use the system's default output device.
    #[default]
    SystemDefault,
    /// Use a specific device by name.
    ByName(String),
}

/// Builder for configuring a read-aloud session.
///
/// Use [`StreamSpeech::builder()`] to create a new builder. Without further
/// configuration the session drives `piper-tts` and plays on the default
/// output device.
///
/// # Example
///
/// ```no_run
/// use stream_speech::{EngineConfig, PipelineConfig, StreamSpeech};
///
/// let session = StreamSpeech::builder()
///     .piper(EngineConfig {
///         program: "/opt/piper/piper".into(),
///         ..Default::default()
///     })
///     .device("USB Audio")
///     .with_config(PipelineConfig {
///         queue_capacity: Some(4),
///         ..Default::default()
///     })
///     .on_event(|e| {
///         if let Some(message) = e.error_message() {
///             eprintln!("{message}");
///         }
///     })
///     .build()?;
/// # Ok::<(), stream_speech::SpeechError>(())
/// ```
///
/// [`StreamSpeech::builder()`]: crate::StreamSpeech::builder
#[must_use]
pub struct StreamSpeechBuilder {
    /// Engine supplied by the caller, replacing the piper engine.
    engine: Option<Arc<dyn Synthesizer>>,
    /// How to run piper when no engine is supplied.
    engine_config: EngineConfig,
    /// Output supplied by the caller, replacing the cpal device.
    output: Option<Arc<dyn AudioOutput>>,
    /// Which cpal device to open when no output is supplied.
    device: DeviceSelection,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Pipeline configuration.
    config: PipelineConfig,
}

impl Default for StreamSpeechBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSpeechBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            engine: None,
            engine_config: EngineConfig::default(),
            output: None,
            device: DeviceSelection::default(),
            event_callback: None,
            config: PipelineConfig::default(),
        }
    }

    /// Use a custom synthesis engine.
    pub fn engine<E: Synthesizer + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Use an engine that is shared with other code.
    pub fn shared_engine(mut self, engine: Arc<dyn Synthesizer>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Configure the piper engine.
    ///
    /// Ignored if [`engine()`](Self::engine) is also set.
    pub fn piper(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Use a custom output instead of a cpal device.
    pub fn output<O: AudioOutput + 'static>(mut self, output: O) -> Self {
        self.output = Some(Arc::new(output));
        self
    }

    /// Play on the named output device instead of the default one.
    ///
    /// See [`list_output_devices()`](crate::output::list_output_devices).
    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.device = DeviceSelection::ByName(name.into());
        self
    }

    /// Set a callback to receive pipeline events.
    ///
    /// The callback runs on worker threads.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom pipeline configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Lists the voices in the configured voice directory.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the directory exists but cannot be read.
    pub fn voices(&self) -> Result<VoiceCatalog, SpeechError> {
        match self.engine_config.voice_dir {
            Some(ref dir) => VoiceCatalog::scan(dir),
            None => Ok(VoiceCatalog::default()),
        }
    }

    fn resolve_output(&self) -> Result<Arc<dyn AudioOutput>, SpeechError> {
        if let Some(ref output) = self.output {
            return Ok(Arc::clone(output));
        }
        let device = match self.device {
            DeviceSelection::SystemDefault => CpalOutput::open_default()?,
            DeviceSelection::ByName(ref name) => CpalOutput::open_by_name(name)?,
        };
        Ok(Arc::new(device.with_config(&self.config)))
    }

    /// Creates the session.
    ///
    /// No engine process is started until playback or rendering begins.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultDevice`, `DeviceNotFound` or `BackendError` if the
    /// output device cannot be opened.
    pub fn build(self) -> Result<Session, SpeechError> {
        let output = self.resolve_output()?;
        let engine = match self.engine {
            Some(engine) => engine,
            None => Arc::new(PiperEngine::from_config(&self.engine_config)),
        };
        Ok(Session::new(engine, output, self.event_callback, self.config))
    }
}

/// Main entry point for stream-speech.
///
/// Use [`StreamSpeech::builder()`] to start configuring a session.
pub struct StreamSpeech;

impl StreamSpeech {
    /// Creates a new builder for configuring a session.
    pub fn builder() -> StreamSpeechBuilder {
        StreamSpeechBuilder::new()
    }
}
