//! Cooperative cancellation for one playback run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "keep running" flag of a run.
///
/// Each worker receives a clone when it is started and checks it once per
/// loop iteration. Cancelling never interrupts an engine call or a device
/// write in progress.
#[derive(Debug, Clone)]
pub(crate) struct RunToken {
    running: Arc<AtomicBool>,
}

impl RunToken {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests that all workers holding this token stop.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}
