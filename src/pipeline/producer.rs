//! Synthesis worker: lines in, frames out.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::engine::{SynthesisRequest, Synthesizer};
use crate::pipeline::{Counters, RunToken, TransferQueue};
use crate::{AudioFrame, EngineError, EventCallback, Line, PipelineEvent, RenderedAudio};

/// Destination for the frames a producer emits.
pub(crate) trait FrameTarget {
    fn accept(&mut self, frame: AudioFrame);
}

/// Streams frames onto a transfer queue.
///
/// The end-of-stream marker is pushed when the target is dropped, so it is
/// sent exactly once however the producer loop ends, panics included.
pub(crate) struct QueueTarget {
    queue: Arc<TransferQueue>,
}

impl QueueTarget {
    pub fn new(queue: Arc<TransferQueue>) -> Self {
        Self { queue }
    }
}

impl FrameTarget for QueueTarget {
    fn accept(&mut self, frame: AudioFrame) {
        let index = frame.source_index;
        if !self.queue.push_frame(frame) {
            tracing::debug!("queue closed, dropped frame for line +{}", index);
        }
    }
}

impl Drop for QueueTarget {
    fn drop(&mut self) {
        self.queue.push_end();
    }
}

/// Accumulates frames for a render job.
#[derive(Default)]
pub(crate) struct RenderTarget {
    chunks: Vec<Vec<f32>>,
    sample_rate: Option<u32>,
}

impl FrameTarget for RenderTarget {
    fn accept(&mut self, frame: AudioFrame) {
        match self.sample_rate {
            None => self.sample_rate = Some(frame.sample_rate),
            Some(rate) if rate != frame.sample_rate => {
                tracing::warn!(
                    "line +{} is {}Hz but render output is {}Hz; not resampled",
                    frame.source_index,
                    frame.sample_rate,
                    rate
                );
            }
            Some(_) => {}
        }
        self.chunks.push(frame.samples);
    }
}

impl RenderTarget {
    /// Concatenates the chunks in order, or `None` if nothing succeeded.
    pub fn finish(self) -> Option<RenderedAudio> {
        let sample_rate = self.sample_rate?;
        Some(RenderedAudio::new(self.chunks.concat(), sample_rate))
    }
}

/// Summary of one producer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProducerReport {
    pub synthesized: usize,
    pub failed: usize,
    pub silent: usize,
    pub cancelled: bool,
}

/// Emits the completion signal when dropped, and a fault first if the
/// producer is unwinding from a panic.
struct CompletionGuard<'a> {
    events: Option<&'a EventCallback>,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        let Some(events) = self.events else {
            return;
        };
        if std::thread::panicking() {
            tracing::error!("synthesis worker panicked");
            events(PipelineEvent::WorkerFault {
                message: "synthesis worker panicked".to_string(),
            });
        }
        events(PipelineEvent::SynthesisFinished);
    }
}

/// Runs the engine over a slice of lines, one at a time, in order.
pub(crate) struct Producer {
    engine: Arc<dyn Synthesizer>,
    request: SynthesisRequest,
    lines: Arc<[Line]>,
    token: RunToken,
    events: Option<EventCallback>,
    counters: Arc<Counters>,
}

impl Producer {
    pub fn new(
        engine: Arc<dyn Synthesizer>,
        request: SynthesisRequest,
        lines: Arc<[Line]>,
        token: RunToken,
        events: Option<EventCallback>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            engine,
            request,
            lines,
            token,
            events,
            counters,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }

    /// Synthesizes every line into `target`.
    ///
    /// Per-line engine failures are reported and skipped. Any other engine
    /// error is reported as a worker fault and returned; the loop stops.
    pub fn run(&self, target: &mut impl FrameTarget) -> Result<ProducerReport, EngineError> {
        let _completion = CompletionGuard {
            events: self.events.as_ref(),
        };
        let mut report = ProducerReport::default();

        tracing::info!(
            "Synthesis starting: {} lines via {}, length_scale={}",
            self.lines.len(),
            self.engine.name(),
            self.request.length_scale
        );

        for (offset, line) in self.lines.iter().enumerate() {
            if !self.token.is_running() {
                report.cancelled = true;
                tracing::debug!("synthesis cancelled before line {}", line.index);
                break;
            }

            match self.engine.synthesize(&line.text, &self.request) {
                Ok(Some(audio)) => {
                    tracing::debug!(
                        "synthesized line {}: {} samples at {}Hz",
                        line.index,
                        audio.samples.len(),
                        audio.sample_rate
                    );
                    report.synthesized += 1;
                    self.counters
                        .lines_synthesized
                        .fetch_add(1, Ordering::Relaxed);
                    target.accept(AudioFrame::new(offset, audio.samples, audio.sample_rate));
                }
                Ok(None) => {
                    report.silent += 1;
                    tracing::debug!("line {} produced no audio", line.index);
                }
                Err(EngineError::Failed {
                    status,
                    diagnostics,
                }) => {
                    report.failed += 1;
                    self.counters.lines_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("engine failed on line {} ({}): {}", line.index, status, diagnostics);
                    self.emit(PipelineEvent::LineFailed {
                        index: line.index,
                        text: line.text.clone(),
                        diagnostics,
                    });
                }
                Err(e) => {
                    tracing::error!("synthesis worker fault on line {}: {}", line.index, e);
                    self.emit(PipelineEvent::WorkerFault {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Synthesis finished: {} synthesized, {} failed, {} silent",
            report.synthesized,
            report.failed,
            report.silent
        );
        Ok(report)
    }
}
