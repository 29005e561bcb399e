//! Synthesis-to-playback pipeline.
//!
//! Each playback run owns one producer thread, one consumer thread and a
//! transfer queue between them:
//!
//! ```text
//! Lines → Producer (engine) → TransferQueue → Consumer (device)
//! ```
//!
//! - **Producer**: one engine call per line, in order; pushes a frame per
//!   line that produced audio, then end-of-stream.
//! - **Transfer queue**: blocking FIFO; draining it is how a run is cancelled.
//! - **Consumer**: announces each line's position, then writes its samples
//!   to the device, reopening the stream when the sample rate changes.
//!
//! Render jobs reuse the producer with a buffering target instead of a queue.

use std::sync::atomic::AtomicU64;

mod consumer;
mod producer;
mod queue;
mod token;

pub(crate) use consumer::Consumer;
pub(crate) use producer::{Producer, QueueTarget, RenderTarget};
pub(crate) use queue::{QueueItem, TransferQueue};
pub(crate) use token::RunToken;

/// Counters shared between a session and its workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub runs_started: AtomicU64,
    pub lines_synthesized: AtomicU64,
    pub lines_failed: AtomicU64,
    pub frames_played: AtomicU64,
    pub samples_played: AtomicU64,
}
