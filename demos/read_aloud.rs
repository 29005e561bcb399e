//! Read a text file aloud with piper, controlled from the terminal.
//!
//! Lines are printed as they are spoken. Type a command and press Enter:
//! `p` pauses, `r` resumes, `s` stops, `q` quits.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example read_aloud -- document.txt [voice.onnx] [speed]
//!
//! # With engine and pipeline logs:
//! RUST_LOG=stream_speech=debug cargo run --example read_aloud -- document.txt
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;

use stream_speech::{PipelineEvent, PlaybackSettings, PlaybackState, StreamSpeech};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(document) = args.next() else {
        eprintln!("usage: read_aloud <document.txt> [voice.onnx] [speed]");
        std::process::exit(2);
    };
    let text = std::fs::read_to_string(&document)?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let builder = StreamSpeech::builder();
    let voice = match args.next() {
        Some(path) => PathBuf::from(path),
        None => match builder.voices()?.first() {
            Some(voice) => voice.path.clone(),
            None => {
                eprintln!("no voices found; pass a model path");
                std::process::exit(2);
            }
        },
    };
    let speed = match args.next() {
        Some(speed) => speed.parse()?,
        None => 1.0,
    };

    let session = builder
        .on_event(move |event| match event {
            PipelineEvent::PositionChanged { source_line, .. } => {
                if let Some(line) = lines.get(source_line) {
                    println!("> {line}");
                }
            }
            PipelineEvent::StateChanged { state } => println!("[{state:?}]"),
            other => {
                if let Some(message) = other.error_message() {
                    eprintln!("{message}");
                }
            }
        })
        .build()?;

    println!("Voice: {}", voice.display());
    println!("Commands: p = pause, r = resume, s = stop, q = quit\n");
    session.start(&text, 0, PlaybackSettings::new(&voice).with_speed(speed))?;

    for command in io::stdin().lock().lines() {
        let result = match command?.trim() {
            "p" => session.pause(),
            "r" => session.resume(),
            "s" => {
                session.stop();
                Ok(())
            }
            "q" => break,
            "" if session.state() == PlaybackState::Stopped => break,
            other => {
                println!("unknown command: {other}");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{e}");
        }
    }

    session.stop();
    let stats = session.stats();
    println!(
        "\nSynthesized {} lines ({} failed), played {} samples",
        stats.lines_synthesized, stats.lines_failed, stats.samples_played
    );
    Ok(())
}
