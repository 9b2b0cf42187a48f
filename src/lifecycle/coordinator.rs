//! Staged shutdown sequencing.
//!
//! # Responsibilities
//! - Run the shutdown sequence exactly once, in order:
//!   close the gate, drain in-flight requests, stop listeners, close the runtime
//! - Bound the drain with the drain timeout and the drain+stop unit with the
//!   container timeout
//! - Guarantee the runtime close runs no matter how earlier phases end
//!
//! # Design Decisions
//! - `run` consumes the coordinator, so a second trigger is a compile error
//!   rather than a runtime hazard
//! - The drain+stop unit runs on its own task; an elapsed outer bound leaves
//!   it detached and moves on, mirroring a connector that refuses to die
//! - Phase transitions are published on a watch channel and are monotonic

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use thiserror::Error as ThisError;
use tokio::sync::watch;
use tokio::time;

use crate::config::ShutdownConfig;
use crate::lifecycle::gate::AdmissionGate;
use crate::lifecycle::registry::ListenerRegistry;
use crate::observability::metrics;

/// Phases of the shutdown sequence, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    /// Normal operation; shutdown has not been triggered.
    Idle,
    /// New admissions are rejected.
    GateClosed,
    /// Waiting for in-flight requests to finish.
    Draining,
    /// Every registered listener has been told to stop.
    ListenersStopped,
    /// The runtime close step has run; the process is about to exit.
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShutdownPhase::Idle => "idle",
            ShutdownPhase::GateClosed => "gate_closed",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::ListenersStopped => "listeners_stopped",
            ShutdownPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Final teardown collaborator.
///
/// Whatever owns the application's background work implements this; the
/// coordinator calls it exactly once, as the last step, regardless of how the
/// drain and listener phases went.
pub trait RuntimeCloser: Send + 'static {
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), Box<dyn Error + Send + Sync>>>;
}

/// Errors surfaced by the final runtime-close step.
///
/// Earlier phases never error out of [`ShutdownCoordinator::run`]; a drain
/// timeout or a listener that refuses to stop is logged and the sequence
/// continues.
#[derive(Debug, ThisError)]
pub enum ShutdownError {
    #[error("runtime close failed: {0}")]
    CloseFailed(Box<dyn Error + Send + Sync>),

    #[error("runtime close did not finish within {0:?}")]
    CloseTimedOut(Duration),
}

/// Drives the shutdown sequence.
///
/// Built once at startup, handed everything it needs, and consumed by
/// [`run`](Self::run) when the shutdown trigger fires.
pub struct ShutdownCoordinator {
    gate: AdmissionGate,
    registry: Arc<ListenerRegistry>,
    closer: Box<dyn RuntimeCloser>,
    drain_timeout: Duration,
    container_timeout: Duration,
    phase: Arc<watch::Sender<ShutdownPhase>>,
}

impl ShutdownCoordinator {
    pub fn new(
        gate: AdmissionGate,
        registry: Arc<ListenerRegistry>,
        closer: Box<dyn RuntimeCloser>,
        config: &ShutdownConfig,
    ) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Idle);
        Self {
            gate,
            registry,
            closer,
            drain_timeout: config.drain_timeout(),
            container_timeout: config.container_timeout(),
            phase: Arc::new(phase),
        }
    }

    /// Observe phase transitions; useful for status endpoints and tests.
    pub fn phase_watch(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Run the full shutdown sequence.
    ///
    /// Takes the coordinator by value: the sequence runs once per process
    /// lifetime. Only a failure of the final runtime-close step is returned;
    /// everything before it is logged and recovered from in place.
    pub async fn run(self) -> Result<(), ShutdownError> {
        let Self {
            gate,
            registry,
            closer,
            drain_timeout,
            container_timeout,
            phase,
        } = self;

        let started = Instant::now();
        tracing::info!(
            drain_timeout_ms = drain_timeout.as_millis() as u64,
            container_timeout_ms = container_timeout.as_millis() as u64,
            "Graceful shutdown triggered"
        );

        // Phase 1: reject all new admissions from this point on.
        gate.close();
        advance_phase(&phase, ShutdownPhase::GateClosed);

        // Phases 2 and 3 run as one unit on their own task so the container
        // timeout can bound the pair from the outside.
        let unit_gate = gate.clone();
        let unit_registry = Arc::clone(&registry);
        let unit_phase = Arc::clone(&phase);
        let drain_unit = tokio::spawn(async move {
            advance_phase(&unit_phase, ShutdownPhase::Draining);
            let in_flight = unit_gate.active_requests();
            tracing::info!(in_flight, "Waiting for in-flight requests to finish");

            let drain_started = Instant::now();
            let drained = unit_gate.drain_latch().wait(drain_timeout).await;
            metrics::record_drain(drained, drain_started.elapsed());
            if drained {
                tracing::info!(
                    elapsed_ms = drain_started.elapsed().as_millis() as u64,
                    "Drain complete"
                );
            } else {
                tracing::warn!(
                    remaining = unit_gate.active_requests(),
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain timed out, stopping listeners anyway"
                );
            }

            unit_registry.stop_all();
            advance_phase(&unit_phase, ShutdownPhase::ListenersStopped);
        });

        match time::timeout(container_timeout, drain_unit).await {
            Ok(Ok(())) => tracing::info!("Listener shutdown finished"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Drain task failed, proceeding to teardown")
            }
            Err(_) => tracing::error!(
                timeout_ms = container_timeout.as_millis() as u64,
                "Drain and listener stop did not finish in time, proceeding to teardown"
            ),
        }

        // Phase 4: close the runtime. Nothing above can return early, so this
        // runs whatever happened to the drain unit.
        tracing::info!("Closing application runtime");
        let result = match time::timeout(container_timeout, closer.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShutdownError::CloseFailed(e)),
            Err(_) => Err(ShutdownError::CloseTimedOut(container_timeout)),
        };
        advance_phase(&phase, ShutdownPhase::Terminated);

        match &result {
            Ok(()) => tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Graceful shutdown complete"
            ),
            Err(e) => tracing::error!(error = %e, "Runtime close failed"),
        }
        result
    }
}

/// Move the published phase forward; backward transitions are dropped.
fn advance_phase(phase: &watch::Sender<ShutdownPhase>, next: ShutdownPhase) {
    phase.send_if_modified(|current| {
        if next > *current {
            *current = next;
            true
        } else {
            false
        }
    });
}
