//! WAV file sink implementation.

use crate::format::f32_to_i16;
use crate::sink::Sink;
use crate::{RenderedAudio, SinkError};
use async_trait::async_trait;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sample encoding of the written WAV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WavEncoding {
    /// 16-bit signed integer PCM.
    #[default]
    Pcm16,
    /// 32-bit IEEE float.
    Float32,
}

impl WavEncoding {
    fn spec(self, sample_rate: u32) -> hound::WavSpec {
        let (bits_per_sample, sample_format) = match self {
            Self::Pcm16 => (16, hound::SampleFormat::Int),
            Self::Float32 => (32, hound::SampleFormat::Float),
        };
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// A sink that writes rendered audio to a mono WAV file.
///
/// The file is created on first write, when the sample rate is known, and
/// finalized on `on_stop()`. All file I/O is performed in a blocking
/// thread pool to avoid blocking the async runtime.
///
/// # Example
///
/// ```no_run
/// use stream_speech::{FileSink, WavEncoding};
///
/// let sink = FileSink::wav("chapter-1.wav");
/// let float_sink = FileSink::wav("chapter-1-f32.wav").with_encoding(WavEncoding::Float32);
/// ```
pub struct FileSink {
    name: String,
    path: Arc<PathBuf>,
    encoding: WavEncoding,
    state: Arc<Mutex<FileState>>,
}

#[derive(Default)]
struct FileState {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    samples_written: u64,
}

fn hound_error(path: &Path, err: hound::Error) -> SinkError {
    match err {
        hound::Error::IoError(e) => SinkError::file_error(path, e),
        other => SinkError::write_failed(other.to_string()),
    }
}

impl FileSink {
    /// Creates a new file sink that writes 16-bit PCM WAV.
    pub fn wav(path: impl AsRef<Path>) -> Self {
        Self {
            name: format!("file:{}", path.as_ref().display()),
            path: Arc::new(path.as_ref().to_path_buf()),
            encoding: WavEncoding::default(),
            state: Arc::new(Mutex::new(FileState::default())),
        }
    }

    /// Sets the sample encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: WavEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Returns the path the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_blocking(
        state: &mut FileState,
        path: &Path,
        encoding: WavEncoding,
        audio: &RenderedAudio,
    ) -> Result<(), SinkError> {
        if state.writer.is_none() {
            let writer = hound::WavWriter::create(path, encoding.spec(audio.sample_rate))
                .map_err(|e| hound_error(path, e))?;
            state.writer = Some(writer);
            state.sample_rate = audio.sample_rate;
        } else if state.sample_rate != audio.sample_rate {
            tracing::warn!(
                "{}: {}Hz buffer appended to {}Hz file without resampling",
                path.display(),
                audio.sample_rate,
                state.sample_rate
            );
        }

        if let Some(ref mut writer) = state.writer {
            for &sample in audio.samples.iter() {
                let written = match encoding {
                    WavEncoding::Pcm16 => writer.write_sample(f32_to_i16(sample)),
                    WavEncoding::Float32 => writer.write_sample(sample),
                };
                written.map_err(|e| hound_error(path, e))?;
            }
            state.samples_written += audio.samples.len() as u64;
        }
        Ok(())
    }

    fn finalize_blocking(state: &mut FileState, path: &Path) -> Result<(), SinkError> {
        if let Some(writer) = state.writer.take() {
            writer.finalize().map_err(|e| hound_error(path, e))?;
            tracing::info!(
                "Wrote {} samples at {}Hz to {}",
                state.samples_written,
                state.sample_rate,
                path.display()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, audio: &RenderedAudio) -> Result<(), SinkError> {
        tracing::debug!(
            "FileSink {}: writing {} samples at {}Hz",
            self.name,
            audio.len(),
            audio.sample_rate
        );

        let audio = audio.clone();
        let encoding = self.encoding;
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::write_blocking(&mut state, &path, encoding, &audio)
        })
        .await
        .map_err(|e| SinkError::custom(format!("write task panicked: {e}")))?
    }

    async fn on_stop(&self) -> Result<(), SinkError> {
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::finalize_blocking(&mut state, &path)
        })
        .await
        .map_err(|e| SinkError::custom(format!("finalize task panicked: {e}")))?
    }
}
