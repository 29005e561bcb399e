//! CPAL device wrapper for audio playback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig as CpalStreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

use crate::output::{AudioOutput, PlaybackStream};
use crate::{OutputError, PipelineConfig, SpeechError};

/// Smallest ring buffer, in samples, regardless of the configured duration.
const MIN_RING_CAPACITY: usize = 1024;

/// Extra time allowed for the device to play out its own buffer on close.
const CLOSE_GRACE: Duration = Duration::from_millis(50);

/// Wrapper around a CPAL audio output device.
///
/// Each opened stream owns a lock-free ring buffer. [`PlaybackStream::write`]
/// pushes into it and sleeps while it is full; the CPAL callback pops from
/// it and fills any shortfall with silence. This keeps the callback
/// non-blocking while the writer sees real backpressure.
#[must_use]
pub struct CpalOutput {
    device: Device,
    name: String,
    buffer_duration: Duration,
    poll_interval: Duration,
}

impl CpalOutput {
    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultDevice` if no default output device is configured.
    pub fn open_default() -> Result<Self, SpeechError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SpeechError::NoDefaultDevice)?;
        Ok(Self::from_device(device))
    }

    /// Opens a specific output device by name.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no device with the given name exists.
    pub fn open_by_name(name: &str) -> Result<Self, SpeechError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| SpeechError::BackendError(e.to_string()))?;

        for device in devices {
            if device.name().is_ok_and(|device_name| device_name == name) {
                return Ok(Self::from_device(device));
            }
        }

        Err(SpeechError::DeviceNotFound {
            name: name.to_string(),
        })
    }

    fn from_device(device: Device) -> Self {
        let config = PipelineConfig::default();
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        Self {
            device,
            name,
            buffer_duration: config.output_buffer,
            poll_interval: config.write_poll_interval,
        }
    }

    /// Applies the buffering settings of a pipeline configuration.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.buffer_duration = config.output_buffer;
        self.poll_interval = config.write_poll_interval;
        self
    }

    fn ring_capacity(&self, sample_rate: u32) -> usize {
        let samples = f64::from(sample_rate) * self.buffer_duration.as_secs_f64();
        (samples as usize).max(MIN_RING_CAPACITY)
    }
}

impl AudioOutput for CpalOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackStream>, OutputError> {
        let ring_buffer = HeapRb::<f32>::new(self.ring_capacity(sample_rate));
        let (producer, mut consumer) = ring_buffer.split();

        let fault: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let callback_fault = Arc::clone(&fault);

        let config = CpalStreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let filled = consumer.pop_slice(data);
                    data[filled..].fill(0.0);
                },
                move |err| {
                    tracing::error!("Audio output stream error: {}", err);
                    *callback_fault.lock() = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| OutputError::open_failed(sample_rate, e.to_string()))?;

        stream
            .play()
            .map_err(|e| OutputError::open_failed(sample_rate, e.to_string()))?;

        tracing::info!("Opened output stream on {}: {}Hz mono", self.name, sample_rate);

        Ok(Box::new(CpalStream {
            stream,
            producer,
            sample_rate,
            fault,
            buffer_duration: self.buffer_duration,
            poll_interval: self.poll_interval,
        }))
    }
}

/// A running playback stream on a CPAL device.
///
/// Dropping it stops the CPAL stream immediately; [`PlaybackStream::close`]
/// lets queued samples play first.
struct CpalStream {
    stream: Stream,
    producer: ringbuf::HeapProd<f32>,
    sample_rate: u32,
    fault: Arc<Mutex<Option<String>>>,
    buffer_duration: Duration,
    poll_interval: Duration,
}

impl CpalStream {
    fn check_fault(&self) -> Result<(), OutputError> {
        match self.fault.lock().as_ref() {
            Some(reason) => Err(OutputError::write_failed(reason.clone())),
            None => Ok(()),
        }
    }
}

impl PlaybackStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, mut samples: &[f32]) -> Result<(), OutputError> {
        while !samples.is_empty() {
            self.check_fault()?;
            let pushed = self.producer.push_slice(samples);
            samples = &samples[pushed..];
            if !samples.is_empty() {
                std::thread::sleep(self.poll_interval);
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), OutputError> {
        let deadline = Instant::now() + self.buffer_duration + CLOSE_GRACE;
        while !self.producer.is_empty() && Instant::now() < deadline {
            self.check_fault()?;
            std::thread::sleep(self.poll_interval);
        }
        std::thread::sleep(CLOSE_GRACE);

        if let Err(e) = self.stream.pause() {
            tracing::debug!("pausing output stream failed: {}", e);
        }
        tracing::debug!("Closed {}Hz output stream", self.sample_rate);
        Ok(())
    }
}

/// Lists all available output devices.
///
/// # Errors
///
/// Returns an error if the audio host cannot be accessed.
pub fn list_output_devices() -> Result<Vec<String>, SpeechError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| SpeechError::BackendError(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Gets the name of the default output device, if any.
pub fn default_output_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| d.name().ok())
}
