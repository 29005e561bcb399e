//! # stream-speech
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Streaming text-to-speech playback with pause, resume and highlighting.
//!
//! `stream-speech` splits a document into lines, synthesizes them one at a
//! time with an external engine (piper by default) and plays each line as
//! soon as it is ready, while later lines are still being synthesized. A
//! UI receives position events to highlight the line being spoken.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_speech::{PipelineEvent, PlaybackSettings, StreamSpeech};
//!
//! let session = StreamSpeech::builder()
//!     .on_event(|event| match event {
//!         PipelineEvent::PositionChanged { index, .. } => println!("reading line {index}"),
//!         other => {
//!             if let Some(message) = other.error_message() {
//!                 eprintln!("{message}");
//!             }
//!         }
//!     })
//!     .build()?;
//!
//! let settings = PlaybackSettings::new("/voices/en_US-amy-medium.onnx").with_speed(1.2);
//! session.start("First line.\n\nSecond line.", 0, settings)?;
//!
//! // ... later, from a button handler:
//! session.pause()?;
//! session.resume()?;
//! session.wait();
//! # Ok::<(), stream_speech::SpeechError>(())
//! ```
//!
//! ## Architecture
//!
//! Each playback run has two OS threads:
//!
//! - **Synthesis thread**: one engine process per line; never touches the device
//! - **Transfer queue**: FIFO of decoded frames plus an end-of-stream marker
//! - **Playback thread**: owns the output stream and blocks on device writes
//!
//! Pausing or stopping cancels the run cooperatively: the current engine
//! call and device write finish, queued audio is discarded, and both threads
//! exit. Rendering to a file reuses the synthesis loop without the device.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
pub mod engine;
mod error;
mod event;
pub mod format;
mod frame;
pub mod output;
mod pipeline;
mod render;
mod session;
mod sink;
mod text;
mod voice;

pub use builder::{StreamSpeech, StreamSpeechBuilder};
pub use config::{
    default_voice_dir, speed_from_slider, volume_from_percent, EngineConfig, PipelineConfig,
    PlaybackSettings, DEFAULT_ENGINE_PROGRAM,
};
pub use error::{EngineError, OutputError, SinkError, SpeechError};
pub use event::{event_callback, EventCallback, PipelineEvent};
pub use frame::{AudioFrame, RenderedAudio};
pub use render::Renderer;
pub use session::{PlaybackState, Session, SessionStats};
pub use sink::{ChannelSink, FileSink, Sink, WavEncoding};
pub use text::{index_for_source_line, segment, Line};
pub use voice::{Voice, VoiceCatalog};
