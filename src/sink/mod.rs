//! Sink trait and implementations for rendered audio.
//!
//! A [`Sink`] is any destination that can receive a rendered buffer. The
//! crate provides two built-in sinks:
//!
//! - [`FileSink`]: Writes the buffer to a WAV file
//! - [`ChannelSink`]: Sends the buffer to a tokio mpsc channel
//!
//! You can implement the [`Sink`] trait for custom destinations like an
//! encoder or an upload.

mod channel;
mod file;

pub use channel::ChannelSink;
pub use file::{FileSink, WavEncoding};

use crate::{RenderedAudio, SinkError};
use async_trait::async_trait;

/// A destination for rendered audio.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability (`Mutex`, `RwLock`) if needed
/// - All methods are async and run on the tokio runtime
/// - `on_start` is called before any audio is written; open resources here
/// - `on_stop` is called after the last write, even if a write failed
///
/// # Example
///
/// ```
/// use stream_speech::{RenderedAudio, Sink, SinkError};
/// use async_trait::async_trait;
///
/// struct PrintSink {
///     name: String,
/// }
///
/// #[async_trait]
/// impl Sink for PrintSink {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     async fn write(&self, audio: &RenderedAudio) -> Result<(), SinkError> {
///         println!("Received {} samples", audio.len());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called once before any audio is written.
    ///
    /// Default implementation does nothing.
    async fn on_start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Write a rendered buffer.
    async fn write(&self, audio: &RenderedAudio) -> Result<(), SinkError>;

    /// Called once after writing, to flush and close resources.
    ///
    /// Default implementation does nothing.
    async fn on_stop(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
