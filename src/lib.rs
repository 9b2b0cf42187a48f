//! Graceful shutdown for long-running Axum services.
//!
//! Admission gating, in-flight draining, listener stop, and staged teardown
//! under two timeouts.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::{HttpServer, ServeError};
pub use lifecycle::{
    AdmissionGate, AdmissionPermit, AppRuntime, DrainLatch, ListenerHandle, ListenerRegistry,
    RuntimeCloser, ShutdownCoordinator, ShutdownError, ShutdownPhase,
};
