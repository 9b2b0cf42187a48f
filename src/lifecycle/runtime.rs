//! Background-worker runtime.
//!
//! # Responsibilities
//! - Own the handles of long-lived background tasks (stats loops, pollers)
//! - Broadcast a stop signal and join every worker when the runtime closes
//!
//! # Design Decisions
//! - Workers subscribe to a broadcast channel instead of holding a reference
//!   to the runtime, so the runtime can be consumed at close time
//! - A worker that panicked is logged and skipped; one bad worker must not
//!   keep the process from exiting

use std::error::Error;
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::coordinator::RuntimeCloser;

/// Holds the application's background workers until shutdown.
///
/// Registered tasks are expected to watch a [`subscribe`](Self::subscribe)d
/// receiver and exit promptly once the stop signal arrives.
pub struct AppRuntime {
    stop: broadcast::Sender<()>,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl AppRuntime {
    pub fn new() -> Self {
        let (stop, _) = broadcast::channel(1);
        Self {
            stop,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Receiver for the stop signal; hand one to every spawned worker.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.stop.subscribe()
    }

    /// Track a worker so it is joined when the runtime closes.
    pub fn register_task(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        tracing::debug!(task = %name, "Background task registered");
        self.tasks
            .lock()
            .expect("runtime task list mutex poisoned")
            .push((name, handle));
    }

    pub fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .expect("runtime task list mutex poisoned")
            .len()
    }
}

impl Default for AppRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeCloser for AppRuntime {
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), Box<dyn Error + Send + Sync>>> {
        Box::pin(async move {
            let runtime = *self;
            let tasks = runtime
                .tasks
                .into_inner()
                .expect("runtime task list mutex poisoned");
            tracing::info!(tasks = tasks.len(), "Stopping background tasks");

            // Ignore the send result; zero live receivers just means every
            // worker already exited on its own.
            let _ = runtime.stop.send(());

            for (name, handle) in tasks {
                match handle.await {
                    Ok(()) => tracing::debug!(task = %name, "Background task stopped"),
                    Err(e) => {
                        tracing::warn!(task = %name, error = %e, "Background task ended abnormally")
                    }
                }
            }
            tracing::info!("Application runtime closed");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn close_signals_and_joins_registered_workers() {
        let runtime = AppRuntime::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let mut rx = runtime.subscribe();
        let flag = Arc::clone(&stopped);
        runtime.register_task(
            "worker",
            tokio::spawn(async move {
                let _ = rx.recv().await;
                flag.store(true, Ordering::SeqCst);
            }),
        );
        assert_eq!(runtime.task_count(), 1);

        Box::new(runtime).close().await.expect("close succeeds");
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn close_survives_a_panicked_worker() {
        let runtime = AppRuntime::new();
        runtime.register_task(
            "doomed",
            tokio::spawn(async {
                panic!("worker blew up");
            }),
        );
        runtime.register_task(
            "fine",
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }),
        );

        Box::new(runtime).close().await.expect("close still succeeds");
    }

    #[tokio::test]
    async fn close_with_no_workers_is_immediate() {
        let runtime = AppRuntime::new();
        Box::new(runtime).close().await.expect("close succeeds");
    }
}
