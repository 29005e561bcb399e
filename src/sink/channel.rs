//! Tokio mpsc channel sink implementation.

use crate::sink::Sink;
use crate::{RenderedAudio, SinkError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A sink that sends rendered audio to a tokio mpsc channel.
///
/// The buffer is shared, not copied: receivers get a clone of the
/// [`RenderedAudio`] handle.
///
/// # Example
///
/// ```
/// use stream_speech::{ChannelSink, RenderedAudio};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<RenderedAudio>(1);
/// let sink = ChannelSink::new(tx);
///
/// // Pass the sink to a render job, then:
/// // let audio = rx.recv().await;
/// ```
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<RenderedAudio>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::Sender<RenderedAudio>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel sink with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<RenderedAudio>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, audio: &RenderedAudio) -> Result<(), SinkError> {
        self.sender
            .send(audio.clone())
            .await
            .map_err(|_| SinkError::ChannelClosed)
    }
}
