//! Discovery of installed voice models.

use std::path::{Path, PathBuf};

use crate::SpeechError;

/// File extension of voice models.
const MODEL_EXTENSION: &str = "onnx";

/// A voice model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// File name of the model, e.g. `en_US-amy-medium.onnx`.
    pub name: String,
    /// Full path passed to the engine.
    pub path: PathBuf,
}

/// The voice models found in one directory, sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    /// Lists the `*.onnx` files in `dir`.
    ///
    /// A missing directory yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the directory exists but cannot be read.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self, SpeechError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::debug!("voice directory {} does not exist", dir.display());
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| {
            SpeechError::BackendError(format!("cannot read {}: {e}", dir.display()))
        })?;

        let mut voices: Vec<Voice> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == MODEL_EXTENSION)
            })
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some(Voice { name, path })
            })
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!("found {} voices in {}", voices.len(), dir.display());
        Ok(Self { voices })
    }

    /// Returns all voices in name order.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Looks a voice up by file name.
    pub fn get(&self, name: &str) -> Option<&Voice> {
        self.voices.iter().find(|voice| voice.name == name)
    }

    /// Returns the first voice in name order.
    pub fn first(&self) -> Option<&Voice> {
        self.voices.first()
    }

    /// Returns `true` if no voices were found.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
