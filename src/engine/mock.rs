//! Scripted synthesizer for testing without an engine installed.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{SynthesisRequest, SynthesizedAudio, Synthesizer};
use crate::EngineError;

/// A synthesizer that returns constant-amplitude audio for every line.
///
/// Individual lines can be scripted to fail, fault, produce nothing, or
/// come back at a different sample rate or length. Every call is recorded.
///
/// # Example
///
/// ```
/// use stream_speech::engine::{MockEngine, SynthesisRequest, Synthesizer};
///
/// let engine = MockEngine::new(22050)
///     .with_samples_per_line(100)
///     .fail_on("bad line");
///
/// let request = SynthesisRequest { voice: "voice.onnx".into(), length_scale: 1.0 };
/// let audio = engine.synthesize("Hello.", &request).unwrap().unwrap();
/// assert_eq!(audio.samples.len(), 100);
/// assert!(engine.synthesize("bad line", &request).is_err());
/// assert_eq!(engine.calls(), vec!["Hello.", "bad line"]);
/// ```
pub struct MockEngine {
    sample_rate: u32,
    samples_per_line: usize,
    amplitude: f32,
    delay: Duration,
    failures: HashSet<String>,
    faults: HashSet<String>,
    panics: HashSet<String>,
    silent: HashSet<String>,
    rates: HashMap<String, u32>,
    lengths: HashMap<String, usize>,
    calls: Mutex<Vec<(String, SynthesisRequest)>>,
}

impl MockEngine {
    /// Creates a mock producing 1600 samples per line at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_per_line: 1600,
            amplitude: 0.5,
            delay: Duration::ZERO,
            failures: HashSet::new(),
            faults: HashSet::new(),
            panics: HashSet::new(),
            silent: HashSet::new(),
            rates: HashMap::new(),
            lengths: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the number of samples returned for each line.
    #[must_use]
    pub fn with_samples_per_line(mut self, samples: usize) -> Self {
        self.samples_per_line = samples;
        self
    }

    /// Sets the value of every returned sample.
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Makes every call block for `delay` before returning.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes the engine reject `text` with a per-line failure.
    #[must_use]
    pub fn fail_on(mut self, text: impl Into<String>) -> Self {
        self.failures.insert(text.into());
        self
    }

    /// Makes the engine return an unrecoverable error for `text`.
    #[must_use]
    pub fn fault_on(mut self, text: impl Into<String>) -> Self {
        self.faults.insert(text.into());
        self
    }

    /// Makes the engine panic when asked to synthesize `text`.
    #[must_use]
    pub fn panic_on(mut self, text: impl Into<String>) -> Self {
        self.panics.insert(text.into());
        self
    }

    /// Makes the engine succeed without audio for `text`.
    #[must_use]
    pub fn silent_on(mut self, text: impl Into<String>) -> Self {
        self.silent.insert(text.into());
        self
    }

    /// Returns audio for `text` at a different sample rate.
    #[must_use]
    pub fn rate_for(mut self, text: impl Into<String>, sample_rate: u32) -> Self {
        self.rates.insert(text.into(), sample_rate);
        self
    }

    /// Returns `samples` samples for `text`.
    #[must_use]
    pub fn length_for(mut self, text: impl Into<String>, samples: usize) -> Self {
        self.lengths.insert(text.into(), samples);
        self
    }

    /// Returns the texts submitted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(text, _)| text.clone()).collect()
    }

    /// Returns the requests submitted so far, in call order.
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.calls
            .lock()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }
}

impl Synthesizer for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn synthesize(
        &self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<Option<SynthesizedAudio>, EngineError> {
        self.calls.lock().push((text.to_string(), request.clone()));

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if self.panics.contains(text) {
            panic!("mock engine asked to panic on {text:?}");
        }
        if self.faults.contains(text) {
            return Err(EngineError::decode(format!("scripted fault on {text:?}")));
        }
        if self.failures.contains(text) {
            return Err(EngineError::Failed {
                status: "exit status: 1".to_string(),
                diagnostics: format!("scripted failure on {text:?}"),
            });
        }
        if self.silent.contains(text) {
            return Ok(None);
        }

        let len = self
            .lengths
            .get(text)
            .copied()
            .unwrap_or(self.samples_per_line);
        let sample_rate = self.rates.get(text).copied().unwrap_or(self.sample_rate);

        Ok(Some(SynthesizedAudio {
            samples: vec![self.amplitude; len],
            sample_rate,
        }))
    }
}
