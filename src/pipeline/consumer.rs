//! Playback worker: frames in, device writes out.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::format::apply_gain;
use crate::output::{AudioOutput, PlaybackStream};
use crate::pipeline::{Counters, QueueItem, RunToken, TransferQueue};
use crate::{EventCallback, Line, OutputError, PipelineEvent};

/// Emits `PlaybackFinished` when the consumer exits by any path.
struct FinishGuard<'a> {
    events: Option<&'a EventCallback>,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if let Some(events) = self.events {
            if std::thread::panicking() {
                events(PipelineEvent::WorkerFault {
                    message: "playback worker panicked".to_string(),
                });
            }
            events(PipelineEvent::PlaybackFinished);
        }
    }
}

/// Summary of one consumer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsumerReport {
    pub frames_played: usize,
    pub streams_opened: usize,
    pub device_fault: bool,
}

/// Plays frames from a transfer queue in order.
///
/// A stream is opened on the first frame and reopened whenever the sample
/// rate changes; consecutive frames at the same rate reuse it.
pub(crate) struct Consumer {
    output: Arc<dyn AudioOutput>,
    volume: f32,
    offset: usize,
    lines: Arc<[Line]>,
    token: RunToken,
    events: Option<EventCallback>,
    counters: Arc<Counters>,
}

impl Consumer {
    /// `offset` is the index of the first line of the run in the full
    /// sequence; frame indices are relative to it.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        volume: f32,
        offset: usize,
        lines: Arc<[Line]>,
        token: RunToken,
        events: Option<EventCallback>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            output,
            volume,
            offset,
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

    /// Receives until end-of-stream or cancellation.
    ///
    /// On a device failure the run is cancelled, the queue is closed so the
    /// producer cannot block on it, and `DeviceFault` is emitted.
    pub fn run(&self, queue: &TransferQueue) -> ConsumerReport {
        let _finished = FinishGuard {
            events: self.events.as_ref(),
        };
        let mut report = ConsumerReport::default();
        let mut stream: Option<Box<dyn PlaybackStream>> = None;

        let played = self.play(queue, &mut stream, &mut report);
        let closed = stream.take().map_or(Ok(()), |s| s.close());

        let outcome = match (played, closed) {
            (Err(e), Err(close_err)) => {
                tracing::debug!("closing faulted stream also failed: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        };

        if let Err(e) = outcome {
            report.device_fault = true;
            tracing::error!("Playback device fault: {}", e);
            self.token.cancel();
            let discarded = queue.close();
            if discarded > 0 {
                tracing::debug!("discarded {} queued frames after device fault", discarded);
            }
            self.emit(PipelineEvent::DeviceFault {
                message: e.to_string(),
            });
        }

        tracing::info!(
            "Playback finished: {} frames, {} streams opened",
            report.frames_played,
            report.streams_opened
        );
        report
    }

    fn play(
        &self,
        queue: &TransferQueue,
        stream: &mut Option<Box<dyn PlaybackStream>>,
        report: &mut ConsumerReport,
    ) -> Result<(), OutputError> {
        loop {
            let frame = match queue.recv() {
                QueueItem::Frame(frame) => frame,
                QueueItem::EndOfStream => return Ok(()),
            };
            if !self.token.is_running() {
                tracing::debug!("playback cancelled, dropping frame +{}", frame.source_index);
                return Ok(());
            }

            let index = self.offset + frame.source_index;
            let source_line = self
                .lines
                .get(frame.source_index)
                .map_or(index, |line| line.source_line);
            self.emit(PipelineEvent::PositionChanged { index, source_line });

            if frame.is_empty() {
                continue;
            }

            let active = match stream.take() {
                Some(current) if current.sample_rate() == frame.sample_rate => stream.insert(current),
                previous => {
                    if let Some(previous) = previous {
                        tracing::debug!(
                            "sample rate changed {}Hz -> {}Hz, reopening stream",
                            previous.sample_rate(),
                            frame.sample_rate
                        );
                        previous.close()?;
                    }
                    report.streams_opened += 1;
                    stream.insert(self.output.open(frame.sample_rate)?)
                }
            };

            let samples = apply_gain(&frame.samples, self.volume);
            active.write(&samples)?;

            report.frames_played += 1;
            self.counters.frames_played.fetch_add(1, Ordering::Relaxed);
            self.counters
                .samples_played
                .fetch_add(samples.len() as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_callback;
    use crate::output::{MockOutput, OutputRecord};
    use crate::{segment, AudioFrame};
    use parking_lot::Mutex;

    fn consumer(
        output: MockOutput,
        volume: f32,
        offset: usize,
        text: &str,
    ) -> (Consumer, Arc<Mutex<Vec<PipelineEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let consumer = Consumer::new(
            Arc::new(output),
            volume,
            offset,
            segment(text).into(),
            RunToken::new(),
            Some(event_callback(move |e| sink.lock().push(e))),
            Arc::new(Counters::default()),
        );
        (consumer, events)
    }

    fn positions(events: &[PipelineEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::PositionChanged { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plays_frames_in_order_with_offset() {
        let output = MockOutput::new();
        let (consumer, events) = consumer(output.clone(), 1.0, 3, "a\nb");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.1; 4], 22050));
        queue.push_frame(AudioFrame::new(1, vec![0.2; 4], 22050));
        queue.push_end();

        let report = consumer.run(&queue);

        assert_eq!(report.frames_played, 2);
        assert_eq!(report.streams_opened, 1);
        assert_eq!(positions(&events.lock()), vec![3, 4]);
        assert!(matches!(
            events.lock().last(),
            Some(PipelineEvent::PlaybackFinished)
        ));
        assert!(matches!(
            output.records().last(),
            Some(OutputRecord::Closed { sample_rate: 22050 })
        ));
    }

    #[test]
    fn test_rate_change_reopens_stream() {
        let output = MockOutput::new();
        let (consumer, _events) = consumer(output.clone(), 1.0, 0, "a\nb\nc");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.1; 2], 16000));
        queue.push_frame(AudioFrame::new(1, vec![0.1; 2], 22050));
        queue.push_frame(AudioFrame::new(2, vec![0.1; 2], 22050));
        queue.push_end();

        let report = consumer.run(&queue);

        assert_eq!(report.streams_opened, 2);
        let records = output.records();
        assert_eq!(records[0], OutputRecord::Opened { sample_rate: 16000 });
        assert_eq!(records[2], OutputRecord::Closed { sample_rate: 16000 });
        assert_eq!(records[3], OutputRecord::Opened { sample_rate: 22050 });
        assert_eq!(output.open_count(), 2);
    }

    #[test]
    fn test_volume_scales_samples() {
        let output = MockOutput::new();
        let (consumer, _events) = consumer(output.clone(), 0.5, 0, "a");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.8, -0.4], 22050));
        queue.push_end();

        consumer.run(&queue);

        assert_eq!(output.writes(), vec![(22050, vec![0.4, -0.2])]);
    }

    #[test]
    fn test_cancelled_token_drops_pending_frame() {
        let output = MockOutput::new();
        let (consumer, events) = consumer(output.clone(), 1.0, 0, "a");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.1; 2], 22050));
        consumer.token.cancel();

        let report = consumer.run(&queue);

        assert_eq!(report.frames_played, 0);
        assert!(positions(&events.lock()).is_empty());
        assert_eq!(output.open_count(), 0);
    }

    #[test]
    fn test_device_fault_cancels_and_closes_queue() {
        let output = MockOutput::new().fail_on_write(1);
        let (consumer, events) = consumer(output, 1.0, 0, "a\nb");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.1; 2], 22050));
        queue.push_frame(AudioFrame::new(1, vec![0.1; 2], 22050));

        let report = consumer.run(&queue);

        assert!(report.device_fault);
        assert!(!consumer.token.is_running());
        assert!(queue.is_empty());
        assert!(!queue.push_frame(AudioFrame::new(2, vec![0.1], 22050)));

        let events = events.lock();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::DeviceFault { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::PlaybackFinished)));
    }

    #[test]
    fn test_open_failure_is_device_fault() {
        let output = MockOutput::new().fail_open();
        let (consumer, events) = consumer(output, 1.0, 0, "a");
        let queue = TransferQueue::new(None);
        queue.push_frame(AudioFrame::new(0, vec![0.1; 2], 22050));
        queue.push_end();

        assert!(consumer.run(&queue).device_fault);
        assert!(events
            .lock()
            .iter()
            .any(|e| matches!(e, PipelineEvent::DeviceFault { .. })));
    }
}
