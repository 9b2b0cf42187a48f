//! Listener registration and teardown.
//!
//! # Responsibilities
//! - Collect handles to every network listener as the app brings them up
//! - Stop them all, best-effort, during the shutdown sequence
//!
//! # Design Decisions
//! - Append-only during normal operation; consumed once at shutdown
//! - A handle that fails to stop is logged and skipped, never allowed to
//!   abort the pass or the rest of the sequence

use std::error::Error;
use std::sync::Mutex;

/// A stoppable network listener, registered as it becomes active.
pub trait ListenerHandle: Send + Sync {
    /// Label used in shutdown logs.
    fn describe(&self) -> String;

    /// Stop accepting and release the listener's resources.
    fn stop(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Tracks live listeners so the shutdown sequence can stop them.
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Box<dyn ListenerHandle>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener. Safe to call from concurrently starting
    /// listeners; order of registration is not significant.
    pub fn register(&self, handle: Box<dyn ListenerHandle>) {
        let mut listeners = self
            .listeners
            .lock()
            .expect("listener registry mutex poisoned");
        tracing::debug!(listener = %handle.describe(), "listener registered");
        listeners.push(handle);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .expect("listener registry mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every registered listener, consuming the registry's contents.
    ///
    /// Failures are isolated per handle: each one is logged and the pass
    /// moves on to the next listener.
    pub fn stop_all(&self) {
        let mut listeners = self
            .listeners
            .lock()
            .expect("listener registry mutex poisoned");

        let total = listeners.len();
        let mut failed = 0usize;
        for handle in listeners.drain(..) {
            match handle.stop() {
                Ok(()) => {
                    tracing::debug!(listener = %handle.describe(), "listener stopped");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        listener = %handle.describe(),
                        error = %e,
                        "failed to stop listener, continuing with the rest"
                    );
                }
            }
        }
        tracing::info!(stopped = total - failed, failed, "listener stop pass finished");
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
