//! Error types for stream-speech.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`SpeechError`]): Rejected requests and failures that end a job
//! - **Recoverable events**: Per-line failures surfaced via [`EventCallback`](crate::EventCallback)
//!
//! [`EngineError`] and [`OutputError`] describe failures of the two external
//! collaborators (the synthesis engine and the audio device). [`SinkError`]
//! covers file export.

use std::path::PathBuf;

/// Fatal errors and precondition violations.
///
/// These are returned synchronously from [`Session`](crate::Session) and
/// [`Renderer`](crate::Renderer) calls. Problems that occur while a run is in
/// progress are delivered through the event callback instead.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// There is no non-blank text to read or render.
    #[error("text is empty")]
    EmptyText,

    /// The request conflicts with live playback.
    #[error("playback is in progress - stop it first")]
    AlreadyPlaying,

    /// A render job is running and owns the synthesis engine.
    #[error("a render job is in progress")]
    RenderInProgress,

    /// `pause()` was called while nothing was playing.
    #[error("nothing is playing")]
    NotPlaying,

    /// `resume()` was called while the session was not paused.
    #[error("playback is not paused")]
    NotPaused,

    /// The speed factor is not a positive finite number.
    #[error("invalid speed {speed}: must be a positive number")]
    InvalidSpeed {
        /// The rejected speed factor.
        speed: f32,
    },

    /// The volume factor is outside `[0, 1]`.
    #[error("invalid volume {volume}: must be between 0.0 and 1.0")]
    InvalidVolume {
        /// The rejected volume factor.
        volume: f32,
    },

    /// No voice model was selected.
    #[error("no voice selected")]
    NoVoiceSelected,

    /// The requested output device was not found.
    #[error("output device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default output device is configured on this system.
    #[error("no default output device configured")]
    NoDefaultDevice,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// A worker thread could not be started or died unexpectedly.
    #[error("worker fault: {reason}")]
    WorkerFault {
        /// What went wrong.
        reason: String,
    },

    /// A render finished without a single successfully synthesized line.
    #[error("no audio was produced")]
    NothingRendered,

    /// The synthesis engine could not be used.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Writing rendered audio to a sink failed.
    #[error("sink '{sink_name}' failed: {source}")]
    Sink {
        /// Name of the sink that failed.
        sink_name: String,
        /// The underlying sink error.
        #[source]
        source: SinkError,
    },
}

impl SpeechError {
    /// Creates a worker fault error with the given reason.
    pub fn worker_fault(reason: impl Into<String>) -> Self {
        Self::WorkerFault {
            reason: reason.into(),
        }
    }
}

/// Errors from one invocation of the synthesis engine.
///
/// Only [`EngineError::Failed`] is a per-line failure: the engine ran and
/// rejected the text, and the job moves on to the next line. Every other
/// variant means the engine cannot be driven at all and ends the job.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine process could not be launched.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Talking to a running engine process failed.
    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine exited unsuccessfully for this line.
    #[error("engine exited with {status}: {diagnostics}")]
    Failed {
        /// Exit status as reported by the OS.
        status: String,
        /// Diagnostic output (stderr) of the engine.
        diagnostics: String,
    },

    /// The engine produced audio that could not be decoded.
    #[error("undecodable engine output: {reason}")]
    Decode {
        /// Why decoding failed.
        reason: String,
    },

    /// The voice model file does not exist.
    #[error("voice model not found: {path}")]
    ModelNotFound {
        /// Path that was checked.
        path: PathBuf,
    },
}

impl EngineError {
    /// Returns `true` if only the current line is affected.
    pub fn is_line_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Creates a decode error with the given reason.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// Errors from the audio output device.
///
/// Device errors are not retried: they end the current playback run.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// A stream at the requested format could not be opened.
    #[error("failed to open {sample_rate}Hz output stream: {reason}")]
    OpenFailed {
        /// Requested sample rate.
        sample_rate: u32,
        /// Backend description of the failure.
        reason: String,
    },

    /// Writing samples to an open stream failed.
    #[error("output write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },
}

impl OutputError {
    /// Creates an open failure for the given sample rate.
    pub fn open_failed(sample_rate: u32, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            sample_rate,
            reason: reason.into(),
        }
    }

    /// Creates a write failure with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}
