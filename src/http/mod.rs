//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, listener registration)
//!     → middleware/admission.rs (gate check, permit held for the request)
//!     → application handlers
//!     → Send to client, permit dropped
//! ```

pub mod middleware;
pub mod server;

pub use middleware::admission_middleware;
pub use server::{HttpServer, ServeError};
