//! Recording output device for testing without hardware.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::output::{AudioOutput, PlaybackStream};
use crate::OutputError;

/// One operation observed by a [`MockOutput`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutputRecord {
    /// A stream was opened.
    Opened {
        /// Rate the stream was opened at.
        sample_rate: u32,
    },
    /// Samples were written to the open stream.
    Wrote {
        /// Rate of the stream written to.
        sample_rate: u32,
        /// The samples, after volume was applied.
        samples: Vec<f32>,
    },
    /// The stream was closed.
    Closed {
        /// Rate of the closed stream.
        sample_rate: u32,
    },
}

#[derive(Default)]
struct MockState {
    records: Vec<OutputRecord>,
    writes: usize,
}

/// An output device that records every stream operation.
///
/// Clones share the same record, so a test can keep one handle while the
/// pipeline owns another.
///
/// # Example
///
/// ```
/// use stream_speech::output::{AudioOutput, MockOutput, PlaybackStream};
///
/// let output = MockOutput::new();
/// let mut stream = output.open(22050).unwrap();
/// stream.write(&[0.1, 0.2]).unwrap();
/// stream.close().unwrap();
///
/// assert_eq!(output.open_count(), 1);
/// assert_eq!(output.written_samples(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<MockState>>,
    write_delay: Duration,
    fail_on_write: Option<usize>,
    fail_open: bool,
}

impl MockOutput {
    /// Creates a mock output that accepts everything instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write block for `delay`, like a real device draining.
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Makes the `n`th write (1-based) fail.
    #[must_use]
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Makes every `open` fail.
    #[must_use]
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Returns every recorded operation in order.
    pub fn records(&self) -> Vec<OutputRecord> {
        self.state.lock().records.clone()
    }

    /// Returns the sample buffers written, with the rate of their stream.
    pub fn writes(&self) -> Vec<(u32, Vec<f32>)> {
        self.state
            .lock()
            .records
            .iter()
            .filter_map(|record| match record {
                OutputRecord::Wrote {
                    sample_rate,
                    samples,
                } => Some((*sample_rate, samples.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of streams opened.
    pub fn open_count(&self) -> usize {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| matches!(record, OutputRecord::Opened { .. }))
            .count()
    }

    /// Returns the total number of samples written.
    pub fn written_samples(&self) -> usize {
        self.writes().iter().map(|(_, samples)| samples.len()).sum()
    }
}

impl AudioOutput for MockOutput {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackStream>, OutputError> {
        if self.fail_open {
            return Err(OutputError::open_failed(sample_rate, "scripted open failure"));
        }
        self.state
            .lock()
            .records
            .push(OutputRecord::Opened { sample_rate });
        Ok(Box::new(MockStream {
            output: self.clone(),
            sample_rate,
        }))
    }
}

struct MockStream {
    output: MockOutput,
    sample_rate: u32,
}

impl PlaybackStream for MockStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), OutputError> {
        if !self.output.write_delay.is_zero() {
            std::thread::sleep(self.output.write_delay);
        }

        let mut state = self.output.state.lock();
        state.writes += 1;
        if self.output.fail_on_write == Some(state.writes) {
            return Err(OutputError::write_failed("scripted write failure"));
        }
        state.records.push(OutputRecord::Wrote {
            sample_rate: self.sample_rate,
            samples: samples.to_vec(),
        });
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), OutputError> {
        self.output.state.lock().records.push(OutputRecord::Closed {
            sample_rate: self.sample_rate,
        });
        Ok(())
    }
}
