//! One-shot rendering of a whole document to a single buffer.

use std::sync::Arc;

use crate::engine::Synthesizer;
use crate::pipeline::{Counters, Producer, RenderTarget, RunToken};
use crate::sink::Sink;
use crate::{
    segment, EventCallback, Line, PipelineEvent, PlaybackSettings, RenderedAudio, SpeechError,
};

/// Synthesizes every line of a document into one buffer.
///
/// Lines are synthesized in order on the calling thread; there is no queue
/// and no audio device involved. Lines the engine rejects are reported with
/// [`PipelineEvent::LineFailed`] and left out of the buffer.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stream_speech::engine::MockEngine;
/// use stream_speech::{PlaybackSettings, Renderer};
///
/// let renderer = Renderer::new(Arc::new(MockEngine::new(22050).with_samples_per_line(100)));
/// let audio = renderer
///     .render_text("First.\nSecond.", &PlaybackSettings::new("voice.onnx"))
///     .unwrap();
/// assert_eq!(audio.len(), 200);
/// ```
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn Synthesizer>,
    events: Option<EventCallback>,
}

impl Renderer {
    /// Creates a renderer driving the given engine.
    pub fn new(engine: Arc<dyn Synthesizer>) -> Self {
        Self {
            engine,
            events: None,
        }
    }

    /// Delivers line failures and the finished buffer to `callback`.
    #[must_use]
    pub fn on_event(mut self, callback: EventCallback) -> Self {
        self.events = Some(callback);
        self
    }

    pub(crate) fn with_events(engine: Arc<dyn Synthesizer>, events: Option<EventCallback>) -> Self {
        Self { engine, events }
    }

    /// Segments `text` and renders it.
    ///
    /// # Errors
    ///
    /// See [`Renderer::render`].
    pub fn render_text(
        &self,
        text: &str,
        settings: &PlaybackSettings,
    ) -> Result<RenderedAudio, SpeechError> {
        self.render(&segment(text), settings)
    }

    /// Renders the lines into one buffer at the rate of the first line that
    /// produced audio.
    ///
    /// # Errors
    ///
    /// Returns `EmptyText` for no lines, a settings or engine validation
    /// error, `Engine` if the engine could not be driven at all, and
    /// `NothingRendered` if every line failed or was silent.
    pub fn render(
        &self,
        lines: &[Line],
        settings: &PlaybackSettings,
    ) -> Result<RenderedAudio, SpeechError> {
        if lines.is_empty() {
            return Err(SpeechError::EmptyText);
        }
        settings.validate()?;
        let request = settings.request();
        self.engine.validate(&request)?;

        tracing::info!("Render starting: {} lines, speed={}", lines.len(), settings.speed);

        let producer = Producer::new(
            Arc::clone(&self.engine),
            request,
            lines.into(),
            RunToken::new(),
            self.events.clone(),
            Arc::new(Counters::default()),
        );
        let mut target = RenderTarget::default();
        producer.run(&mut target)?;

        let audio = target.finish().ok_or(SpeechError::NothingRendered)?;
        tracing::info!(
            "Render complete: {} samples at {}Hz ({:?})",
            audio.len(),
            audio.sample_rate,
            audio.duration()
        );
        if let Some(ref callback) = self.events {
            callback(PipelineEvent::RenderComplete {
                audio: audio.clone(),
            });
        }
        Ok(audio)
    }

    /// Renders on the blocking thread pool, then writes the buffer to every
    /// sink concurrently.
    ///
    /// # Errors
    ///
    /// Any error of [`Renderer::render`], `WorkerFault` if the render task
    /// panicked, or `Sink` naming the first sink that failed.
    pub async fn render_to_sinks(
        &self,
        lines: Vec<Line>,
        settings: PlaybackSettings,
        sinks: &[Box<dyn Sink>],
    ) -> Result<RenderedAudio, SpeechError> {
        let renderer = self.clone();
        let audio = tokio::task::spawn_blocking(move || renderer.render(&lines, &settings))
            .await
            .map_err(|e| SpeechError::worker_fault(format!("render task panicked: {e}")))??;

        deliver(&audio, sinks).await?;
        Ok(audio)
    }
}

/// Writes one buffer to all sinks concurrently.
///
/// Every sink that started gets `on_stop`, even if another sink failed.
async fn deliver(audio: &RenderedAudio, sinks: &[Box<dyn Sink>]) -> Result<(), SpeechError> {
    let results = futures::future::join_all(sinks.iter().map(|sink| async move {
        sink.on_start().await?;
        let written = sink.write(audio).await;
        let stopped = sink.on_stop().await;
        written.and(stopped)
    }))
    .await;

    for (sink, result) in sinks.iter().zip(results) {
        if let Err(e) = result {
            tracing::error!("Sink {} failed: {}", sink.name(), e);
            return Err(SpeechError::Sink {
                sink_name: sink.name().to_string(),
                source: e,
            });
        }
    }
    Ok(())
}
