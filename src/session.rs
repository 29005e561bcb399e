//! Playback session management.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::engine::Synthesizer;
use crate::output::AudioOutput;
use crate::pipeline::{Consumer, Counters, Producer, QueueTarget, RunToken, TransferQueue};
use crate::sink::{FileSink, Sink};
use crate::{
    segment, EventCallback, Line, PipelineConfig, PipelineEvent, PlaybackSettings, RenderedAudio,
    Renderer, SpeechError,
};

/// Where a session is in its play/pause/stop cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing is playing and no position is remembered.
    #[default]
    Stopped,
    /// A run is synthesizing and playing.
    Playing,
    /// Playback was interrupted; the cursor is remembered for `resume()`.
    Paused,
}

/// Statistics about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Playback runs launched, resumes included.
    pub runs_started: u64,
    /// Lines that produced audio.
    pub lines_synthesized: u64,
    /// Lines the engine rejected.
    pub lines_failed: u64,
    /// Frames written to the device.
    pub frames_played: u64,
    /// Samples written to the device.
    pub samples_played: u64,
}

/// The workers of one playback run.
struct ActiveRun {
    id: u64,
    token: RunToken,
    queue: Arc<TransferQueue>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
    last_position: Option<usize>,
}

impl ActiveRun {
    fn cancel(&self) {
        self.token.cancel();
        let discarded = self.queue.drain_and_close();
        tracing::debug!("run {} cancelled, {} queued frames discarded", self.id, discarded);
    }

    /// Joins both workers, skipping the calling thread if it is one of them.
    fn join(self) {
        let current = thread::current().id();
        for handle in [self.producer, self.consumer] {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::warn!("{} thread of run {} panicked", name, self.id);
            }
        }
    }
}

struct Inner {
    state: PlaybackState,
    lines: Arc<[Line]>,
    cursor: usize,
    highlighted: Option<usize>,
    settings: Option<PlaybackSettings>,
    run: Option<ActiveRun>,
    next_run_id: u64,
    publishing: usize,
}

impl Inner {
    fn is_current(&self, run_id: u64) -> bool {
        self.run.as_ref().is_some_and(|run| run.id == run_id)
    }

    /// Moves to `Stopped`, forgetting the lines and the cursor.
    ///
    /// Returns the retired run, which the caller must cancel and join after
    /// releasing the lock.
    fn reset(&mut self, events: &mut Vec<PipelineEvent>, finished: bool) -> Option<ActiveRun> {
        let run = self.run.take();
        self.cursor = 0;
        self.lines = Vec::new().into();
        if self.highlighted.take().is_some() {
            events.push(PipelineEvent::HighlightCleared);
        }
        if finished {
            events.push(PipelineEvent::PlaybackFinished);
        }
        if self.state != PlaybackState::Stopped {
            self.state = PlaybackState::Stopped;
            events.push(PipelineEvent::StateChanged {
                state: PlaybackState::Stopped,
            });
        }
        run
    }
}

struct Shared {
    engine: Arc<dyn Synthesizer>,
    output: Arc<dyn AudioOutput>,
    events: Option<EventCallback>,
    config: PipelineConfig,
    counters: Arc<Counters>,
    inner: Mutex<Inner>,
    state_changed: Condvar,
    rendering: AtomicBool,
}

impl Shared {
    fn emit(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }

    /// Releases the lock, retires `run`, then delivers `events` in order.
    ///
    /// `wait()` does not return while a transition is being published.
    fn publish(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        retired: Option<ActiveRun>,
        events: Vec<PipelineEvent>,
    ) {
        inner.publishing += 1;
        drop(inner);
        // Workers of the retired run may be parked in `handle_worker_event`.
        self.state_changed.notify_all();

        if let Some(run) = retired {
            run.cancel();
            run.join();
        }
        for event in events {
            self.emit(event);
        }

        self.inner.lock().publishing -= 1;
        self.state_changed.notify_all();
    }

    fn run_callback(self: &Arc<Self>, run_id: u64) -> EventCallback {
        let shared: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_worker_event(run_id, event);
            }
        })
    }

    /// Starts a run over `lines[at..]` with the stored settings.
    ///
    /// An empty slice moves straight to `Stopped`. Must be called with the
    /// lock held; the workers cannot report anything until it is released.
    fn launch(
        self: &Arc<Self>,
        inner: &mut Inner,
        at: usize,
        events: &mut Vec<PipelineEvent>,
    ) -> Result<(), SpeechError> {
        let Some(settings) = inner.settings.clone() else {
            return Err(SpeechError::NoVoiceSelected);
        };
        if at >= inner.lines.len() {
            tracing::info!("Nothing to play from line {} of {}", at, inner.lines.len());
            let _ = inner.reset(events, false);
            return Ok(());
        }

        let id = inner.next_run_id;
        inner.next_run_id += 1;
        let run_lines: Arc<[Line]> = inner.lines[at..].into();
        let token = RunToken::new();
        let queue = Arc::new(TransferQueue::new(self.config.queue_capacity));
        let callback = self.run_callback(id);

        let consumer = Consumer::new(
            Arc::clone(&self.output),
            settings.volume,
            at,
            Arc::clone(&run_lines),
            token.clone(),
            Some(Arc::clone(&callback)),
            Arc::clone(&self.counters),
        );
        let consumer_queue = Arc::clone(&queue);
        let consumer = match thread::Builder::new()
            .name("speech-playback".to_string())
            .spawn(move || {
                consumer.run(&consumer_queue);
            }) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to spawn playback thread: {}", e);
                let _ = inner.reset(events, false);
                return Err(SpeechError::worker_fault(format!(
                    "failed to spawn playback thread: {e}"
                )));
            }
        };

        let producer = Producer::new(
            Arc::clone(&self.engine),
            settings.request(),
            run_lines,
            token.clone(),
            Some(callback),
            Arc::clone(&self.counters),
        );
        let producer_queue = Arc::clone(&queue);
        let producer = match thread::Builder::new()
            .name("speech-synthesis".to_string())
            .spawn(move || {
                let mut target = QueueTarget::new(producer_queue);
                if let Err(e) = producer.run(&mut target) {
                    tracing::debug!("synthesis ended early: {}", e);
                }
            }) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to spawn synthesis thread: {}", e);
                token.cancel();
                queue.drain_and_close();
                let _ = inner.reset(events, false);
                return Err(SpeechError::worker_fault(format!(
                    "failed to spawn synthesis thread: {e}"
                )));
            }
        };

        inner.run = Some(ActiveRun {
            id,
            token,
            queue,
            producer,
            consumer,
            last_position: None,
        });
        inner.cursor = at;
        if inner.state != PlaybackState::Playing {
            inner.state = PlaybackState::Playing;
            events.push(PipelineEvent::StateChanged {
                state: PlaybackState::Playing,
            });
        }
        self.counters.runs_started.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Playback run {} started at line {} of {} (speed={}, volume={})",
            id,
            at,
            inner.lines.len(),
            settings.speed,
            settings.volume
        );
        Ok(())
    }

    fn handle_worker_event(self: &Arc<Self>, run_id: u64, event: PipelineEvent) {
        let mut guard = self.inner.lock();
        // Events of a run follow the transition that launched it.
        loop {
            if !guard.is_current(run_id) {
                tracing::trace!("ignoring event from stale run {}", run_id);
                return;
            }
            if guard.publishing == 0 {
                break;
            }
            self.state_changed.wait(&mut guard);
        }

        match event {
            PipelineEvent::PositionChanged { index, source_line } => {
                let inner = &mut *guard;
                let Some(run) = inner.run.as_mut() else {
                    return;
                };
                if run.last_position.is_some_and(|last| index <= last) {
                    tracing::debug!("ignoring regressing position {} in run {}", index, run_id);
                    return;
                }
                run.last_position = Some(index);
                inner.cursor = index;
                inner.highlighted = Some(index);
                drop(guard);
                self.emit(PipelineEvent::PositionChanged { index, source_line });
            }
            PipelineEvent::WorkerFault { .. } => {
                tracing::error!("Run {} hit a worker fault, stopping", run_id);
                let mut events = vec![event];
                let retired = guard.reset(&mut events, true);
                self.publish(guard, retired, events);
            }
            PipelineEvent::PlaybackFinished => {
                tracing::info!("Playback run {} finished", run_id);
                let mut events = Vec::new();
                let retired = guard.reset(&mut events, true);
                self.publish(guard, retired, events);
            }
            other => {
                drop(guard);
                self.emit(other);
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(run) = self.inner.get_mut().run.take() {
            // Workers finish their current call and exit on their own.
            run.cancel();
        }
    }
}

/// Clears the rendering flag when a render job ends.
struct RenderGuard<'a> {
    rendering: &'a AtomicBool,
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.rendering.store(false, Ordering::SeqCst);
    }
}

/// Handle to a read-aloud session.
///
/// The `Session` is returned by [`StreamSpeechBuilder::build()`] and owns the
/// play/pause/stop state machine. Each `start()` or `resume()` launches a
/// playback run: a synthesis thread and a playback thread connected by a
/// queue. Progress is reported through the event callback.
///
/// # Lifecycle
///
/// 1. `start()` moves `Stopped` to `Playing`
/// 2. `pause()` and `resume()` move between `Playing` and `Paused`
/// 3. `stop()`, or the end of the text, moves back to `Stopped`
/// 4. Dropping the `Session` cancels any run in progress
///
/// Event callbacks run on the worker threads. They may call back into the
/// session (for example `stop()` from a fault handler) but must not call
/// [`wait()`](Session::wait).
///
/// # Example
///
/// ```no_run
/// use stream_speech::{PlaybackSettings, StreamSpeech};
///
/// let session = StreamSpeech::builder()
///     .on_event(|e| tracing::info!(?e, "speech event"))
///     .build()?;
///
/// let settings = PlaybackSettings::new("/voices/en_US-amy-medium.onnx");
/// session.start("Hello.\nWorld.", 0, settings)?;
/// session.wait();
/// # Ok::<(), stream_speech::SpeechError>(())
/// ```
///
/// [`StreamSpeechBuilder::build()`]: crate::StreamSpeechBuilder::build
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub(crate) fn new(
        engine: Arc<dyn Synthesizer>,
        output: Arc<dyn AudioOutput>,
        events: Option<EventCallback>,
        config: PipelineConfig,
    ) -> Self {
        tracing::debug!(
            "Session created: engine={}, output={}",
            engine.name(),
            output.name()
        );
        Self {
            shared: Arc::new(Shared {
                engine,
                output,
                events,
                config,
                counters: Arc::new(Counters::default()),
                inner: Mutex::new(Inner {
                    state: PlaybackState::Stopped,
                    lines: Vec::new().into(),
                    cursor: 0,
                    highlighted: None,
                    settings: None,
                    run: None,
                    next_run_id: 0,
                    publishing: 0,
                }),
                state_changed: Condvar::new(),
                rendering: AtomicBool::new(false),
            }),
        }
    }

    /// Segments `text` and starts reading at line index `at`.
    ///
    /// Starting from `Paused` discards the paused position. If `at` is past
    /// the last line the session ends up `Stopped` without playing anything.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPlaying` or `RenderInProgress` if the engine is busy,
    /// a settings validation error, or `Engine` if the voice model is
    /// unusable. Nothing is started on error.
    pub fn start(
        &self,
        text: &str,
        at: usize,
        settings: PlaybackSettings,
    ) -> Result<(), SpeechError> {
        self.start_lines(segment(text), at, settings)
    }

    /// Starts reading already segmented lines at index `at`.
    ///
    /// # Errors
    ///
    /// See [`Session::start`].
    pub fn start_lines(
        &self,
        lines: Vec<Line>,
        at: usize,
        settings: PlaybackSettings,
    ) -> Result<(), SpeechError> {
        settings.validate()?;
        self.shared.engine.validate(&settings.request())?;

        let mut inner = self.shared.inner.lock();
        if inner.state == PlaybackState::Playing {
            return Err(SpeechError::AlreadyPlaying);
        }
        if self.shared.rendering.load(Ordering::SeqCst) {
            return Err(SpeechError::RenderInProgress);
        }

        let mut events = Vec::new();
        if inner.highlighted.take().is_some() {
            events.push(PipelineEvent::HighlightCleared);
        }
        inner.lines = lines.into();
        inner.settings = Some(settings);

        let result = self.shared.launch(&mut inner, at, &mut events);
        self.shared.publish(inner, None, events);
        result
    }

    /// Interrupts playback, keeping the cursor and the highlight.
    ///
    /// Blocks until both workers have exited: at most one engine call and
    /// one device write.
    ///
    /// # Errors
    ///
    /// Returns `NotPlaying` unless the session is `Playing`.
    pub fn pause(&self) -> Result<(), SpeechError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlaybackState::Playing {
            return Err(SpeechError::NotPlaying);
        }
        let retired = inner.run.take();
        inner.state = PlaybackState::Paused;
        tracing::info!("Paused at line {}", inner.cursor);

        self.shared.publish(
            inner,
            retired,
            vec![PipelineEvent::StateChanged {
                state: PlaybackState::Paused,
            }],
        );
        Ok(())
    }

    /// Continues from the line that was playing when paused.
    ///
    /// That line is synthesized again and played from its beginning.
    ///
    /// # Errors
    ///
    /// Returns `NotPaused` unless the session is `Paused`, or the same
    /// errors as [`Session::start`].
    pub fn resume(&self) -> Result<(), SpeechError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlaybackState::Paused {
            return Err(SpeechError::NotPaused);
        }
        if self.shared.rendering.load(Ordering::SeqCst) {
            return Err(SpeechError::RenderInProgress);
        }
        let Some(settings) = inner.settings.as_ref() else {
            return Err(SpeechError::NoVoiceSelected);
        };
        self.shared.engine.validate(&settings.request())?;

        let at = inner.cursor;
        tracing::info!("Resuming at line {}", at);
        let mut events = Vec::new();
        let result = self.shared.launch(&mut inner, at, &mut events);
        self.shared.publish(inner, None, events);
        result
    }

    /// Play/pause button: pauses when playing, resumes when paused, and
    /// starts `text` at `at` when stopped.
    ///
    /// Returns the state after the call.
    ///
    /// # Errors
    ///
    /// The errors of whichever operation was performed.
    pub fn toggle(
        &self,
        text: &str,
        at: usize,
        settings: PlaybackSettings,
    ) -> Result<PlaybackState, SpeechError> {
        match self.state() {
            PlaybackState::Playing => self.pause()?,
            PlaybackState::Paused => self.resume()?,
            PlaybackState::Stopped => self.start(text, at, settings)?,
        }
        Ok(self.state())
    }

    /// Stops playback, clears the highlight and resets the cursor to 0.
    ///
    /// Does nothing if already stopped. Blocks until both workers have
    /// exited.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state == PlaybackState::Stopped {
            return;
        }
        tracing::info!("Stopping at line {}", inner.cursor);
        let mut events = Vec::new();
        let retired = inner.reset(&mut events, false);
        self.shared.publish(inner, retired, events);
    }

    /// Replaces the settings used by the next `resume()`.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `AlreadyPlaying` while a run is live;
    /// settings are read once at run start.
    pub fn set_settings(&self, settings: PlaybackSettings) -> Result<(), SpeechError> {
        settings.validate()?;
        let mut inner = self.shared.inner.lock();
        if inner.state == PlaybackState::Playing {
            return Err(SpeechError::AlreadyPlaying);
        }
        inner.settings = Some(settings);
        Ok(())
    }

    /// Returns the settings of the current or last run.
    pub fn settings(&self) -> Option<PlaybackSettings> {
        self.shared.inner.lock().settings.clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state
    }

    /// Returns the index of the line playing, or to resume from.
    pub fn cursor(&self) -> usize {
        self.shared.inner.lock().cursor
    }

    /// Returns the index of the highlighted line, if any.
    pub fn highlighted(&self) -> Option<usize> {
        self.shared.inner.lock().highlighted
    }

    /// Returns the lines of the current session; empty when stopped.
    pub fn lines(&self) -> Vec<Line> {
        self.shared.inner.lock().lines.to_vec()
    }

    /// Returns `true` while a render job is in progress.
    pub fn is_rendering(&self) -> bool {
        self.shared.rendering.load(Ordering::SeqCst)
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        let counters = &self.shared.counters;
        SessionStats {
            runs_started: counters.runs_started.load(Ordering::Relaxed),
            lines_synthesized: counters.lines_synthesized.load(Ordering::Relaxed),
            lines_failed: counters.lines_failed.load(Ordering::Relaxed),
            frames_played: counters.frames_played.load(Ordering::Relaxed),
            samples_played: counters.samples_played.load(Ordering::Relaxed),
        }
    }

    /// Blocks until the session is no longer `Playing` and the events of
    /// that transition have been delivered.
    pub fn wait(&self) {
        let mut inner = self.shared.inner.lock();
        while inner.state == PlaybackState::Playing || inner.publishing > 0 {
            self.shared.state_changed.wait(&mut inner);
        }
    }

    /// Like [`wait()`](Session::wait) with a limit.
    ///
    /// Returns `false` if the session was still playing at the deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.state == PlaybackState::Playing || inner.publishing > 0 {
            if self
                .shared
                .state_changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.state != PlaybackState::Playing && inner.publishing == 0;
            }
        }
        true
    }

    fn begin_render(&self) -> Result<RenderGuard<'_>, SpeechError> {
        let inner = self.shared.inner.lock();
        if inner.state == PlaybackState::Playing {
            return Err(SpeechError::AlreadyPlaying);
        }
        if self.shared.rendering.swap(true, Ordering::SeqCst) {
            return Err(SpeechError::RenderInProgress);
        }
        drop(inner);
        Ok(RenderGuard {
            rendering: &self.shared.rendering,
        })
    }

    fn renderer(&self) -> Renderer {
        Renderer::with_events(Arc::clone(&self.shared.engine), self.shared.events.clone())
    }

    /// Renders the whole of `text` to one buffer on the calling thread.
    ///
    /// Volume is not applied. Playback cannot start until this returns.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPlaying` while playing, `RenderInProgress` if another
    /// render is running, or any error of [`Renderer::render`].
    pub fn render(
        &self,
        text: &str,
        settings: &PlaybackSettings,
    ) -> Result<RenderedAudio, SpeechError> {
        let _rendering = self.begin_render()?;
        self.renderer().render_text(text, settings)
    }

    /// Renders `text` on the blocking pool and writes it to every sink.
    ///
    /// # Errors
    ///
    /// As [`Session::render`], plus `Sink` if a sink fails.
    pub async fn render_to_sinks(
        &self,
        text: &str,
        settings: PlaybackSettings,
        sinks: &[Box<dyn Sink>],
    ) -> Result<RenderedAudio, SpeechError> {
        let _rendering = self.begin_render()?;
        self.renderer()
            .render_to_sinks(segment(text), settings, sinks)
            .await
    }

    /// Renders `text` to a 16-bit PCM WAV file.
    ///
    /// # Errors
    ///
    /// As [`Session::render_to_sinks`].
    pub async fn render_to_file(
        &self,
        text: &str,
        settings: PlaybackSettings,
        path: impl AsRef<Path>,
    ) -> Result<RenderedAudio, SpeechError> {
        let sinks: Vec<Box<dyn Sink>> = vec![Box::new(FileSink::wav(path))];
        self.render_to_sinks(text, settings, &sinks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::event_callback;
    use crate::output::MockOutput;
    use std::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn session(
        engine: MockEngine,
        output: MockOutput,
    ) -> (Session, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel();
        let callback = event_callback(move |event| {
            let _ = tx.send(event);
        });
        let session = Session::new(
            Arc::new(engine),
            Arc::new(output),
            Some(callback),
            PipelineConfig::default(),
        );
        (session, rx)
    }

    fn settings() -> PlaybackSettings {
        PlaybackSettings::new("voice.onnx")
    }

    fn wait_for(
        rx: &mpsc::Receiver<PipelineEvent>,
        pred: impl Fn(&PipelineEvent) -> bool,
    ) -> Vec<PipelineEvent> {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv_timeout(TIMEOUT).unwrap();
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    fn is_stopped(event: &PipelineEvent) -> bool {
        matches!(
            event,
            PipelineEvent::StateChanged {
                state: PlaybackState::Stopped
            }
        )
    }

    #[test]
    fn test_session_starts_stopped() {
        let (session, _rx) = session(MockEngine::new(22050), MockOutput::new());
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.cursor(), 0);
        assert!(session.lines().is_empty());
        assert!(session.highlighted().is_none());
    }

    #[test]
    fn test_natural_end_resets_cursor() {
        let (session, rx) = session(MockEngine::new(22050), MockOutput::new());
        session.start("one\ntwo", 0, settings()).unwrap();

        let events = wait_for(&rx, is_stopped);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::PlaybackFinished)));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::HighlightCleared)));

        assert!(session.wait_timeout(TIMEOUT));
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.cursor(), 0);
        assert!(session.lines().is_empty());
        assert_eq!(session.stats().frames_played, 2);
    }

    #[test]
    fn test_start_past_end_is_stopped() {
        let output = MockOutput::new();
        let (session, _rx) = session(MockEngine::new(22050), output.clone());
        session.start("one\ntwo", 5, settings()).unwrap();
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(output.open_count(), 0);
        assert_eq!(session.stats().runs_started, 0);
    }

    #[test]
    fn test_start_while_playing_rejected() {
        let engine = MockEngine::new(22050).with_delay(Duration::from_millis(100));
        let (session, _rx) = session(engine, MockOutput::new());
        session.start("one\ntwo", 0, settings()).unwrap();

        assert!(matches!(
            session.start("three", 0, settings()),
            Err(SpeechError::AlreadyPlaying)
        ));
        session.stop();
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_invalid_settings_rejected_before_start() {
        let (session, _rx) = session(MockEngine::new(22050), MockOutput::new());
        let result = session.start("one", 0, settings().with_volume(1.5));
        assert!(matches!(result, Err(SpeechError::InvalidVolume { .. })));
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_resume_requires_pause() {
        let (session, _rx) = session(MockEngine::new(22050), MockOutput::new());
        assert!(matches!(session.resume(), Err(SpeechError::NotPaused)));
        assert!(matches!(session.pause(), Err(SpeechError::NotPlaying)));
    }

    #[test]
    fn test_toggle_cycles_states() {
        let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
        let (session, rx) = session(MockEngine::new(22050), output);

        let state = session.toggle("one\ntwo\nthree", 0, settings()).unwrap();
        assert_eq!(state, PlaybackState::Playing);
        wait_for(&rx, |e| matches!(e, PipelineEvent::PositionChanged { .. }));

        assert_eq!(
            session.toggle("", 0, settings()).unwrap(),
            PlaybackState::Paused
        );
        assert_eq!(
            session.toggle("", 0, settings()).unwrap(),
            PlaybackState::Playing
        );
        session.stop();
    }

    #[test]
    fn test_set_settings_applies_on_resume() {
        let engine = Arc::new(MockEngine::new(22050));
        let output = MockOutput::new().with_write_delay(Duration::from_millis(200));
        let (tx, rx) = mpsc::channel();
        let session = Session::new(
            Arc::clone(&engine) as Arc<dyn Synthesizer>,
            Arc::new(output),
            Some(event_callback(move |e| {
                let _ = tx.send(e);
            })),
            PipelineConfig::default(),
        );

        session.start("one\ntwo", 0, settings()).unwrap();
        wait_for(&rx, |e| matches!(e, PipelineEvent::PositionChanged { .. }));
        assert!(matches!(
            session.set_settings(settings().with_speed(2.0)),
            Err(SpeechError::AlreadyPlaying)
        ));
        session.pause().unwrap();

        session.set_settings(settings().with_speed(2.0)).unwrap();
        session.resume().unwrap();
        wait_for(&rx, is_stopped);

        let last = engine.requests().last().cloned().unwrap();
        assert!((last.length_scale - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_render_guard_released() {
        let (session, _rx) = session(MockEngine::new(22050), MockOutput::new());
        assert!(session.render("   ", &settings()).is_err());
        assert!(!session.is_rendering());

        let audio = session.render("one", &settings()).unwrap();
        assert_eq!(audio.len(), 1600);
        assert!(!session.is_rendering());
    }
}
