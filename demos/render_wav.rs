//! Render a text file to a WAV file without opening an audio device.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example render_wav -- document.txt voice.onnx output.wav [--float]
//! ```

use std::sync::Arc;

use stream_speech::engine::PiperEngine;
use stream_speech::{
    event_callback, segment, EngineConfig, FileSink, PlaybackSettings, Renderer, Sink,
    WavEncoding,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("stream_speech=info"))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (document, voice, output) = match args.as_slice() {
        [document, voice, output, ..] => (document, voice, output),
        _ => {
            eprintln!("usage: render_wav <document.txt> <voice.onnx> <output.wav> [--float]");
            std::process::exit(2);
        }
    };
    let encoding = if args.iter().any(|a| a == "--float") {
        WavEncoding::Float32
    } else {
        WavEncoding::Pcm16
    };

    let text = tokio::fs::read_to_string(document).await?;
    let engine = PiperEngine::from_config(&EngineConfig::default());
    let renderer = Renderer::new(Arc::new(engine)).on_event(event_callback(|event| {
        if let Some(message) = event.error_message() {
            eprintln!("{message}");
        }
    }));

    let sinks: Vec<Box<dyn Sink>> = vec![Box::new(FileSink::wav(output).with_encoding(encoding))];
    let audio = renderer
        .render_to_sinks(segment(&text), PlaybackSettings::new(voice), &sinks)
        .await?;

    println!(
        "Wrote {} ({:.1}s at {}Hz)",
        output,
        audio.duration().as_secs_f32(),
        audio.sample_rate
    );
    Ok(())
}
