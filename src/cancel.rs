//! Run cancellation signalling.
//!
//! A [`CancelToken`] is a cheap, cloneable flag shared between the UI (or
//! whatever drives the run) and the procedure engine. The engine polls it at
//! well-defined suspension points: between motion-poll iterations, after each
//! swept angle, and between queued runs. It is never checked mid-command, so
//! cancellation cannot leave the stage or source in an undefined state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Externally-settable cancellation flag.
///
/// Cloning yields a handle to the same flag. Setting it is sticky: a
/// cancelled token stays cancelled for the lifetime of the run that observes
/// it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread or task.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
