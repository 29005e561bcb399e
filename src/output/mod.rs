//! Audio output devices.
//!
//! An [`AudioOutput`] opens [`PlaybackStream`]s at a requested sample rate
//! (always mono, f32). The playback consumer keeps at most one stream open
//! and reopens it whenever the sample rate of the incoming audio changes.
//!
//! - [`CpalOutput`]: a real output device via CPAL
//! - [`MockOutput`]: records everything written, for tests

mod device;
mod mock;

pub use device::{default_output_device_name, list_output_devices, CpalOutput};
pub use mock::{MockOutput, OutputRecord};

use crate::OutputError;

/// A device that can open playback streams.
///
/// Implementations are shared with the consumer thread, so they must be
/// `Send + Sync`. The streams they return are used only on that thread.
pub trait AudioOutput: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Opens a mono f32 stream at `sample_rate` and starts it.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackStream>, OutputError>;
}

/// An open, running output stream.
pub trait PlaybackStream {
    /// Sample rate the stream was opened at.
    fn sample_rate(&self) -> u32;

    /// Writes samples, blocking until the device has accepted all of them.
    fn write(&mut self, samples: &[f32]) -> Result<(), OutputError>;

    /// Lets buffered audio play out, then releases the device.
    fn close(self: Box<Self>) -> Result<(), OutputError>;
}
