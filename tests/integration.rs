//! Integration tests for stream-speech.
//!
//! Note: Tests that require actual audio hardware or a piper installation
//! are marked with `#[ignore]` and should be run manually.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stream_speech::engine::{MockEngine, Synthesizer};
use stream_speech::output::{MockOutput, OutputRecord};
use stream_speech::{
    FileSink, PipelineConfig, PipelineEvent, PlaybackSettings, PlaybackState, Session, Sink,
    SpeechError, StreamSpeech,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// A session on mocks, with its events collected on a channel.
struct Harness {
    session: Session,
    engine: Arc<MockEngine>,
    output: MockOutput,
    events: mpsc::Receiver<PipelineEvent>,
}

impl Harness {
    fn new(engine: MockEngine, output: MockOutput) -> Self {
        Self::with_config(engine, output, PipelineConfig::default())
    }

    fn with_config(engine: MockEngine, output: MockOutput, config: PipelineConfig) -> Self {
        let engine = Arc::new(engine);
        let (tx, events) = mpsc::channel();
        let session = StreamSpeech::builder()
            .shared_engine(Arc::clone(&engine) as Arc<dyn Synthesizer>)
            .output(output.clone())
            .with_config(config)
            .on_event(move |event| {
                let _ = tx.send(event);
            })
            .build()
            .unwrap();
        Self {
            session,
            engine,
            output,
            events,
        }
    }

    /// Receives events until one matches, returning everything received.
    fn until(&self, pred: impl Fn(&PipelineEvent) -> bool) -> Vec<PipelineEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.events.recv_timeout(TIMEOUT).unwrap();
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    fn until_stopped(&self) -> Vec<PipelineEvent> {
        self.until(is_stopped)
    }

    fn until_position(&self, index: usize) -> Vec<PipelineEvent> {
        self.until(|e| matches!(e, PipelineEvent::PositionChanged { index: i, .. } if *i == index))
    }

    fn pending(&self) -> Vec<PipelineEvent> {
        self.events.try_iter().collect()
    }
}

fn settings() -> PlaybackSettings {
    PlaybackSettings::new("en_US-amy-medium.onnx")
}

fn is_stopped(event: &PipelineEvent) -> bool {
    matches!(
        event,
        PipelineEvent::StateChanged {
            state: PlaybackState::Stopped
        }
    )
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

fn count(events: &[PipelineEvent], pred: impl Fn(&PipelineEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_hello_world_plays_both_lines() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    h.session.start("Hello.\nWorld.", 0, settings()).unwrap();

    let events = h.until_stopped();
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::StateChanged {
            state: PlaybackState::Playing
        })
    ));
    assert_eq!(positions(&events), vec![0, 1]);
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        1
    );

    assert_eq!(h.session.state(), PlaybackState::Stopped);
    assert_eq!(h.session.cursor(), 0);
    assert!(h.session.highlighted().is_none());
    assert_eq!(h.engine.calls(), vec!["Hello.", "World."]);
    assert_eq!(h.output.open_count(), 1);
    assert_eq!(h.output.written_samples(), 3200);
}

#[test]
fn test_blank_lines_are_skipped_but_source_lines_kept() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    h.session.start("A\n\nB", 0, settings()).unwrap();

    let events = h.until_stopped();
    let located: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PositionChanged { index, source_line } => Some((*index, *source_line)),
            _ => None,
        })
        .collect();
    assert_eq!(located, vec![(0, 0), (1, 2)]);
    assert_eq!(h.engine.calls(), vec!["A", "B"]);
}

#[test]
fn test_start_at_line_offsets_positions() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    h.session.start("a\nb\nc", 1, settings()).unwrap();

    let events = h.until_stopped();
    assert_eq!(positions(&events), vec![1, 2]);
    assert_eq!(h.engine.calls(), vec!["b", "c"]);
}

#[test]
fn test_failed_line_is_skipped_and_reported() {
    let h = Harness::new(MockEngine::new(22050).fail_on("two"), MockOutput::new());
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();

    let events = h.until_stopped();
    assert_eq!(positions(&events), vec![0, 2]);

    let failures: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::LineFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
    let message = failures[0].error_message().unwrap();
    assert!(message.contains("'two'"));

    assert_eq!(h.output.writes().len(), 2);
    assert_eq!(h.session.stats().lines_failed, 1);
    assert_eq!(h.session.stats().lines_synthesized, 2);
}

#[test]
fn test_pause_keeps_cursor_and_resume_restarts_line() {
    let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
    let h = Harness::new(MockEngine::new(22050), output);
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();

    h.until_position(1);
    h.session.pause().unwrap();

    assert_eq!(h.session.state(), PlaybackState::Paused);
    assert_eq!(h.session.cursor(), 1);
    assert_eq!(h.session.highlighted(), Some(1));
    assert_eq!(h.session.lines().len(), 3);

    let after_pause = h.pending();
    assert!(after_pause.iter().any(|e| matches!(
        e,
        PipelineEvent::StateChanged {
            state: PlaybackState::Paused
        }
    )));
    assert_eq!(
        count(&after_pause, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        0
    );
    assert!(positions(&after_pause).is_empty());

    h.session.resume().unwrap();
    let resumed = h.until_stopped();
    assert_eq!(positions(&resumed), vec![1, 2]);

    // The paused line was synthesized again from its beginning.
    let calls = h.engine.calls();
    assert_eq!(calls.iter().filter(|text| *text == "two").count(), 2);
    assert_eq!(h.session.cursor(), 0);
    assert_eq!(h.session.stats().runs_started, 2);
}

#[test]
fn test_stop_resets_and_does_not_report_finish() {
    let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
    let h = Harness::new(MockEngine::new(22050), output);
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();

    h.until_position(0);
    h.session.stop();

    assert_eq!(h.session.state(), PlaybackState::Stopped);
    assert_eq!(h.session.cursor(), 0);
    assert!(h.session.lines().is_empty());
    assert!(h.session.highlighted().is_none());

    let after_stop = h.pending();
    assert_eq!(
        count(&after_stop, |e| matches!(e, PipelineEvent::HighlightCleared)),
        1
    );
    assert_eq!(count(&after_stop, is_stopped), 1);
    assert_eq!(
        count(&after_stop, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        0
    );

    // A second stop is a no-op.
    h.session.stop();
    assert!(h.pending().is_empty());
}

#[test]
fn test_cancellation_is_prompt() {
    let output = MockOutput::new().with_write_delay(Duration::from_millis(100));
    let text = (0..20).map(|i| format!("line {i}\n")).collect::<String>();
    let h = Harness::new(MockEngine::new(22050), output);
    h.session.start(&text, 0, settings()).unwrap();

    h.until_position(0);
    let started = Instant::now();
    h.session.stop();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(h.output.writes().len() <= 2);
    assert!(matches!(
        h.output.records().last(),
        Some(OutputRecord::Closed { .. })
    ));
}

#[test]
fn test_bounded_queue_pause_resume_stop() {
    let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
    let config = PipelineConfig {
        queue_capacity: Some(1),
        ..Default::default()
    };
    let text = (0..8).map(|i| format!("line {i}\n")).collect::<String>();
    let h = Harness::with_config(MockEngine::new(22050), output, config);
    h.session.start(&text, 0, settings()).unwrap();

    // The producer is now parked on the full queue.
    h.until_position(1);
    let started = Instant::now();
    h.session.pause().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.session.state(), PlaybackState::Paused);
    assert_eq!(h.session.cursor(), 1);
    assert!(h.engine.calls().len() < 8);
    let _ = h.pending();

    h.session.resume().unwrap();
    let resumed = h.until_position(2);
    assert_eq!(positions(&resumed), vec![1, 2]);

    let started = Instant::now();
    h.session.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.session.state(), PlaybackState::Stopped);
    assert_eq!(h.session.cursor(), 0);

    let after_stop = h.pending();
    assert_eq!(count(&after_stop, is_stopped), 1);
    assert_eq!(
        count(&after_stop, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        0
    );
    assert!(positions(&after_stop).is_empty());
}

#[test]
fn test_sample_rate_change_reopens_stream() {
    let engine = MockEngine::new(22050).rate_for("two", 16000);
    let h = Harness::new(engine, MockOutput::new());
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();
    h.until_stopped();

    let opened: Vec<_> = h
        .output
        .records()
        .into_iter()
        .filter_map(|r| match r {
            OutputRecord::Opened { sample_rate } => Some(sample_rate),
            _ => None,
        })
        .collect();
    assert_eq!(opened, vec![22050, 16000, 22050]);

    let written: Vec<_> = h.output.writes().into_iter().map(|(rate, _)| rate).collect();
    assert_eq!(written, vec![22050, 16000, 22050]);
}

#[test]
fn test_volume_is_applied_to_playback() {
    let engine = MockEngine::new(22050)
        .with_amplitude(0.5)
        .with_samples_per_line(8);
    let h = Harness::new(engine, MockOutput::new());
    h.session
        .start("one", 0, settings().with_volume(0.5))
        .unwrap();
    h.until_stopped();

    let writes = h.output.writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1.iter().all(|&s| (s - 0.25).abs() < f32::EPSILON));
}

#[test]
fn test_speed_sets_length_scale() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    h.session
        .start("one", 0, settings().with_speed(2.0))
        .unwrap();
    h.until_stopped();

    let request = &h.engine.requests()[0];
    assert!((request.length_scale - 0.5).abs() < f32::EPSILON);
}

#[test]
fn test_device_fault_ends_run() {
    let output = MockOutput::new().fail_on_write(1);
    let h = Harness::new(MockEngine::new(22050), output);
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();

    let events = h.until_stopped();
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::DeviceFault { .. })),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        1
    );
    assert_eq!(h.session.cursor(), 0);
    assert!(h.output.writes().is_empty());
}

#[test]
fn test_worker_fault_forces_stop() {
    let engine = MockEngine::new(22050).fault_on("two");
    let h = Harness::new(engine, MockOutput::new());
    h.session.start("one\ntwo\nthree", 0, settings()).unwrap();

    let events = h.until_stopped();
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::WorkerFault { .. })),
        1
    );
    assert!(!positions(&events).contains(&2));
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::PlaybackFinished)),
        1
    );
    assert_eq!(h.session.state(), PlaybackState::Stopped);
    assert!(!h.engine.calls().contains(&"three".to_string()));
}

#[test]
fn test_engine_panic_is_reported_as_worker_fault() {
    let engine = MockEngine::new(22050).panic_on("two");
    let h = Harness::new(engine, MockOutput::new());
    h.session.start("one\ntwo", 0, settings()).unwrap();

    let events = h.until_stopped();
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::WorkerFault { .. })));
    assert_eq!(h.session.state(), PlaybackState::Stopped);

    // The session is usable again afterwards.
    h.session.start("one", 0, settings()).unwrap();
    let events = h.until_stopped();
    assert_eq!(positions(&events), vec![0]);
}

#[test]
fn test_wait_returns_after_natural_end() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    h.session.start("one\ntwo", 0, settings()).unwrap();
    assert!(h.session.wait_timeout(TIMEOUT));

    let events = h.pending();
    assert!(events.iter().any(is_stopped));
}

#[test]
fn test_render_refused_while_playing() {
    let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
    let h = Harness::new(MockEngine::new(22050), output);
    h.session.start("one\ntwo", 0, settings()).unwrap();
    h.until_position(0);

    assert!(matches!(
        h.session.render("three", &settings()),
        Err(SpeechError::AlreadyPlaying)
    ));
    h.session.stop();
}

#[test]
fn test_render_sums_successful_lines() {
    let engine = MockEngine::new(22050)
        .length_for("one", 100)
        .length_for("two", 50)
        .fail_on("three")
        .length_for("four", 25);
    let h = Harness::new(engine, MockOutput::new());

    let audio = h.session.render("one\ntwo\nthree\nfour", &settings()).unwrap();
    assert_eq!(audio.len(), 175);
    assert_eq!(audio.sample_rate, 22050);
    assert_eq!(h.output.open_count(), 0);

    let events = h.pending();
    assert_eq!(
        count(&events, |e| matches!(e, PipelineEvent::LineFailed { .. })),
        1
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::RenderComplete { .. })));
}

#[test]
fn test_render_empty_text_refused() {
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());
    assert!(matches!(
        h.session.render("\n\n", &settings()),
        Err(SpeechError::EmptyText)
    ));
}

#[tokio::test]
async fn test_render_to_wav_file() {
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let path = dir.path().join("document.wav");
    let engine = MockEngine::new(16000).with_samples_per_line(400);
    let h = Harness::new(engine, MockOutput::new());

    let audio = h
        .session
        .render_to_file("one\ntwo\nthree", settings(), &path)
        .await
        .unwrap();
    assert_eq!(audio.len(), 1200);

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 1200);
}

#[tokio::test]
async fn test_render_to_multiple_sinks() {
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let first = dir.path().join("a.wav");
    let second = dir.path().join("b.wav");
    let h = Harness::new(MockEngine::new(22050), MockOutput::new());

    let sinks: Vec<Box<dyn Sink>> = vec![
        Box::new(FileSink::wav(&first)),
        Box::new(FileSink::wav(&second)),
    ];
    h.session
        .render_to_sinks("one", settings(), &sinks)
        .await
        .unwrap();

    assert!(first.exists());
    assert!(second.exists());
    assert!(!h.session.is_rendering());
}

#[test]
#[ignore = "requires audio hardware"]
fn test_real_device_playback() {
    let session = StreamSpeech::builder()
        .engine(MockEngine::new(22050).with_amplitude(0.05))
        .build()
        .unwrap();

    session.start("one\ntwo", 0, settings()).unwrap();
    assert!(session.wait_timeout(TIMEOUT));
    assert_eq!(session.stats().frames_played, 2);
}

#[test]
#[ignore = "requires piper-tts and a voice model"]
fn test_real_piper_render() {
    let catalog = StreamSpeech::builder().voices().unwrap();
    let voice = catalog.first().unwrap();

    let session = StreamSpeech::builder()
        .output(MockOutput::new())
        .build()
        .unwrap();
    let audio = session
        .render("Hello from piper.", &PlaybackSettings::new(&voice.path))
        .unwrap();
    assert!(!audio.is_empty());
}
