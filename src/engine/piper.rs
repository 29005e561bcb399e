//! Piper command-line engine.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::engine::{decode_wav, SynthesisRequest, SynthesizedAudio, Synthesizer};
use crate::{EngineConfig, EngineError};

/// Runs the Piper executable once per line.
///
/// The line is written to the process's stdin; Piper writes a WAV file to
/// stdout and diagnostics to stderr. The call blocks until the process
/// exits. There is no timeout: a hung process hangs the producer until the
/// run is cancelled and the process finally exits.
///
/// # Example
///
/// ```no_run
/// use stream_speech::engine::PiperEngine;
///
/// let engine = PiperEngine::new("piper-tts");
/// ```
#[derive(Debug, Clone)]
pub struct PiperEngine {
    name: String,
    program: PathBuf,
    extra_args: Vec<OsString>,
}

impl PiperEngine {
    /// Creates an engine that runs the given executable.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            name: format!("piper:{}", program.as_ref().display()),
            program: program.as_ref().to_path_buf(),
            extra_args: Vec::new(),
        }
    }

    /// Creates an engine from configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.program)
    }

    /// Appends an argument passed on every invocation (e.g. `--speaker 3`).
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    fn command(&self, request: &SynthesisRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--model")
            .arg(&request.voice)
            .arg("--length_scale")
            .arg(request.length_scale.to_string())
            .arg("--output_file")
            .arg("-")
            .args(&self.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl Synthesizer for PiperEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, request: &SynthesisRequest) -> Result<(), EngineError> {
        if request.voice.is_file() {
            Ok(())
        } else {
            Err(EngineError::ModelNotFound {
                path: request.voice.clone(),
            })
        }
    }

    fn synthesize(
        &self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<Option<SynthesizedAudio>, EngineError> {
        let mut child = self
            .command(request)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Feed stdin from its own thread so a process that starts writing
        // audio before it has read all input cannot deadlock us.
        let stdin_writer = child.stdin.take().map(|mut stdin| {
            let input = text.as_bytes().to_vec();
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child.wait_with_output()?;

        if let Some(writer) = stdin_writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The process exiting early closes the pipe; its status says why.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(EngineError::Io(e)),
                Err(_) => {
                    return Err(EngineError::Io(std::io::Error::other(
                        "stdin writer thread panicked",
                    )))
                }
            }
        }

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if output.stdout.is_empty() {
            tracing::debug!("{}: no audio for {:?}", self.name, text);
            return Ok(None);
        }

        decode_wav(&output.stdout).map(Some)
    }
}
