//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Admission (gate.rs):
//!     Request arrives → Gate open? → Permit issued → Dropped on completion
//!
//! Shutdown (coordinator.rs):
//!     Signal received → Close gate → Drain in-flight (latch.rs, bounded)
//!                     → Stop listeners (registry.rs) → Close runtime
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop admitting, drain, stop listeners, close
//! - Two deadlines: the drain wait and an outer container bound; the final
//!   runtime close runs no matter which of them fires
//! - Completion is tied to permit drop, so cancelled and panicked requests
//!   still count down

pub mod coordinator;
pub mod gate;
pub mod latch;
pub mod registry;
pub mod runtime;
pub mod signals;

pub use coordinator::{RuntimeCloser, ShutdownCoordinator, ShutdownError, ShutdownPhase};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use latch::DrainLatch;
pub use registry::{ListenerHandle, ListenerRegistry};
pub use runtime::AppRuntime;
