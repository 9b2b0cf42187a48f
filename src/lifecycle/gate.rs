//! Request admission and in-flight tracking.
//!
//! # Responsibilities
//! - Decide, per request, whether work may start (reject once shutdown begins)
//! - Count requests between admission and completion
//! - Lazily create the drain latch, sized to the in-flight count at shutdown
//!
//! # Design Decisions
//! - The shutdown flag is a one-way atomic: written once, read lock-free on
//!   every request, never reverts
//! - Admission hands out an RAII permit; dropping it is the completion path,
//!   so the count stays exact across early returns, panics and cancelled
//!   request futures
//! - Latch creation is the only place needing mutual exclusion; `OnceLock`
//!   runs the sizing read under its init lock, so racing first users all see
//!   one latch sized from a consistent snapshot

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::lifecycle::latch::DrainLatch;

/// Shared state behind every clone of the gate.
#[derive(Debug)]
struct GateInner {
    /// One-way flag; `true` once shutdown has begun.
    shutting_down: AtomicBool,
    /// Requests currently between admission and completion.
    active: AtomicI64,
    /// Drain latch, created at most once, on first use after `close`.
    latch: OnceLock<DrainLatch>,
}

/// Admission control for a service that drains on shutdown.
///
/// Cloning is cheap and every clone observes the same state. Request paths
/// call [`try_admit`](Self::try_admit) before doing any work; the shutdown
/// path calls [`close`](Self::close) once and then waits on
/// [`drain_latch`](Self::drain_latch).
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                shutting_down: AtomicBool::new(false),
                active: AtomicI64::new(0),
                latch: OnceLock::new(),
            }),
        }
    }

    /// Admit one request, unless shutdown has begun.
    ///
    /// Returns `None` once the gate is closed; the caller must answer with a
    /// service-unavailable response and skip the work entirely. On success
    /// the returned permit must live for the duration of the request; its
    /// drop records the completion.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        // Reserve a slot first, then verify the flag. If `close` lands in
        // between, back out: the drain latch may have been sized with this
        // reservation included, which at worst leaves it one signal short
        // and is absorbed by the bounded drain wait. The reverse order could
        // release the latch while admitted requests are still running.
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            self.inner.active.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(AdmissionPermit { gate: self.clone() })
    }

    /// Flip the gate shut. Idempotent; there is no way back to accepting.
    pub fn close(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Requests currently in flight.
    pub fn active_requests(&self) -> i64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Get the drain latch, creating it on first use.
    ///
    /// The latch is sized to the in-flight count observed at creation time.
    /// A count below zero would mean a completion outran its admission; it is
    /// logged and clamped rather than allowed to poison the shutdown.
    pub fn drain_latch(&self) -> &DrainLatch {
        self.inner.latch.get_or_init(|| {
            let snapshot = self.inner.active.load(Ordering::SeqCst);
            if snapshot < 0 {
                tracing::error!(
                    count = snapshot,
                    "active request count below zero, sizing drain latch to zero"
                );
            }
            DrainLatch::new(snapshot.max(0) as u64)
        })
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Permit for one admitted request.
///
/// Dropping the permit marks the request complete on every exit path. If
/// shutdown began while the request was running, the drop also signals the
/// drain latch.
#[derive(Debug)]
pub struct AdmissionPermit {
    gate: AdmissionGate,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if self.gate.is_shutting_down() {
            // Latch before counter: a latch created right here must still
            // count this request, otherwise it would release early.
            self.gate.drain_latch().signal();
            self.gate.inner.active.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("request completed while draining");
        } else {
            self.gate.inner.active.fetch_sub(1, Ordering::SeqCst);
            tracing::trace!("request completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_admissions_and_completions() {
        let gate = AdmissionGate::new();
        assert_eq!(gate.active_requests(), 0);

        let first = gate.try_admit().expect("gate open");
        let second = gate.try_admit().expect("gate open");
        assert_eq!(gate.active_requests(), 2);

        drop(first);
        assert_eq!(gate.active_requests(), 1);
        drop(second);
        assert_eq!(gate.active_requests(), 0);
    }

    #[test]
    fn close_rejects_all_further_admissions() {
        let gate = AdmissionGate::new();
        gate.close();

        assert!(gate.try_admit().is_none());
        assert!(gate.try_admit().is_none());
        assert_eq!(gate.active_requests(), 0);
        assert!(gate.is_shutting_down());
    }

    #[test]
    fn close_is_idempotent() {
        let gate = AdmissionGate::new();
        gate.close();
        gate.close();
        assert!(gate.try_admit().is_none());
    }

    #[test]
    fn latch_sized_to_in_flight_count_at_close() {
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();
        let _second = gate.try_admit().unwrap();

        gate.close();
        assert_eq!(gate.drain_latch().remaining(), 2);

        drop(permit);
        assert_eq!(gate.drain_latch().remaining(), 1);
        assert_eq!(gate.active_requests(), 1);
    }

    #[test]
    fn completion_before_close_skips_the_latch() {
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();
        drop(permit);

        gate.close();
        assert_eq!(gate.drain_latch().remaining(), 0);
    }

    #[test]
    fn latch_is_created_once() {
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();
        gate.close();

        let first = gate.drain_latch() as *const DrainLatch;
        drop(permit);
        let second = gate.drain_latch() as *const DrainLatch;
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn permit_created_latch_counts_its_creator() {
        // No orchestrator involved: the completing request itself creates
        // the latch, which must include that request in its size and end up
        // released once the drop finishes.
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();
        gate.close();
        drop(permit);

        assert_eq!(gate.drain_latch().remaining(), 0);
        assert_eq!(gate.active_requests(), 0);
    }

    #[test]
    fn concurrent_admissions_settle_back_to_zero() {
        let gate = AdmissionGate::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    let permit = gate.try_admit().expect("gate open");
                    drop(permit);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.active_requests(), 0);
    }
}
