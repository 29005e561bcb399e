//! Events delivered to the UI collaborator.
//!
//! Events are called from the pipeline's worker threads, never from the
//! thread that started playback. A GUI should forward them to its own
//! event loop rather than touching widgets inside the callback.

use std::sync::Arc;

use crate::{PlaybackState, RenderedAudio};

/// Notifications emitted by playback runs and render jobs.
///
/// # Example
///
/// ```
/// use stream_speech::PipelineEvent;
///
/// fn handle_event(event: PipelineEvent) {
///     match event {
///         PipelineEvent::PositionChanged { index, source_line } => {
///             eprintln!("now reading line {index} (document line {source_line})");
///         }
///         PipelineEvent::HighlightCleared => {}
///         PipelineEvent::PlaybackFinished => eprintln!("done"),
///         PipelineEvent::StateChanged { state } => eprintln!("state: {state:?}"),
///         PipelineEvent::SynthesisFinished => {}
///         PipelineEvent::RenderComplete { audio } => {
///             eprintln!("rendered {:?} of audio", audio.duration());
///         }
///         other => {
///             if let Some(message) = other.error_message() {
///                 eprintln!("error: {message}");
///             }
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A line is about to start sounding; highlight it.
    ///
    /// Emitted before the line's audio is written to the device. Within one
    /// run, `index` never decreases.
    PositionChanged {
        /// Line index in the segmented document.
        index: usize,
        /// Document line number of that line.
        source_line: usize,
    },

    /// Any line highlight should be removed.
    HighlightCleared,

    /// The engine rejected one line. The line is skipped and the job continues.
    LineFailed {
        /// Line index in the segmented document.
        index: usize,
        /// The text that was submitted.
        text: String,
        /// Engine diagnostic output.
        diagnostics: String,
    },

    /// The synthesis worker hit an unrecoverable error and stopped.
    WorkerFault {
        /// Description of the fault.
        message: String,
    },

    /// The audio device failed; playback of the current run has ended.
    DeviceFault {
        /// Description of the fault.
        message: String,
    },

    /// The run ended on its own: all of its audio was played, or a device
    /// or worker fault forced it to end.
    ///
    /// Not emitted when playback ends because of `pause()` or `stop()`.
    PlaybackFinished,

    /// The synthesis worker finished, was cancelled, or faulted.
    SynthesisFinished,

    /// The session moved to a new state.
    StateChanged {
        /// The new state.
        state: PlaybackState,
    },

    /// A render job produced its buffer.
    RenderComplete {
        /// The concatenated audio.
        audio: RenderedAudio,
    },
}

impl PipelineEvent {
    /// Returns a user-visible message for error events.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::LineFailed {
                text, diagnostics, ..
            } => Some(format!("Synthesis error on line '{text}':\n\n{diagnostics}")),
            Self::WorkerFault { message } => Some(format!("Synthesis worker error:\n\n{message}")),
            Self::DeviceFault { message } => Some(format!("Playback error:\n\n{message}")),
            _ => None,
        }
    }

    /// Returns `true` for events that report a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::LineFailed { .. } | Self::WorkerFault { .. } | Self::DeviceFault { .. }
        )
    }
}

/// Callback type for receiving pipeline events.
///
/// Register an event callback via [`StreamSpeechBuilder::on_event()`].
///
/// [`StreamSpeechBuilder::on_event()`]: crate::StreamSpeechBuilder::on_event
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_speech::{event_callback, PipelineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
