//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wire up middleware (admission gate, tracing, timeout, request ID)
//! - Bind the configured listener and serve the application router
//! - Register a stop handle for every listener so shutdown can close them
//! - Hand out the shutdown coordinator wired to this server's gate and
//!   listeners

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use axum_server::Handle;
use thiserror::Error;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::admission_middleware;
use crate::lifecycle::coordinator::{RuntimeCloser, ShutdownCoordinator};
use crate::lifecycle::gate::AdmissionGate;
use crate::lifecycle::registry::{ListenerHandle, ListenerRegistry};

/// Errors from binding and starting the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stop handle for a bound HTTP listener.
///
/// Stopping is abrupt: by the time the registry runs, the drain phase has
/// already given in-flight requests their chance to finish.
struct HttpListenerHandle {
    addr: SocketAddr,
    handle: Handle,
}

impl ListenerHandle for HttpListenerHandle {
    fn describe(&self) -> String {
        format!("http {}", self.addr)
    }

    fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handle.shutdown();
        Ok(())
    }
}

/// HTTP server with admission control wired in.
pub struct HttpServer {
    config: AppConfig,
    gate: AdmissionGate,
    registry: Arc<ListenerRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            gate: AdmissionGate::new(),
            registry: Arc::new(ListenerRegistry::new()),
        }
    }

    /// The admission gate requests pass through; status handlers read it too.
    pub fn gate(&self) -> AdmissionGate {
        self.gate.clone()
    }

    pub fn registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Build the shutdown coordinator for this server.
    ///
    /// `closer` is whatever owns the rest of the application; it runs last.
    pub fn coordinator(&self, closer: Box<dyn RuntimeCloser>) -> ShutdownCoordinator {
        ShutdownCoordinator::new(
            self.gate(),
            self.registry(),
            closer,
            &self.config.shutdown,
        )
    }

    /// Bind the configured address and start serving in the background.
    ///
    /// Returns the bound address (useful when the config asked for port 0)
    /// and registers a stop handle with the listener registry.
    pub async fn start(&self, router: Router) -> Result<SocketAddr, ServeError> {
        let bind_address = &self.config.listener.bind_address;
        let requested: SocketAddr = bind_address
            .parse()
            .map_err(|_| ServeError::InvalidBindAddress(bind_address.clone()))?;

        let listener = std::net::TcpListener::bind(requested)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let handle = Handle::new();
        self.registry.register(Box::new(HttpListenerHandle {
            addr,
            handle: handle.clone(),
        }));

        let app = self.layered(router);
        let server = axum_server::from_tcp(listener).handle(handle);
        tokio::spawn(async move {
            match server.serve(app.into_make_service()).await {
                Ok(()) => tracing::info!("HTTP server stopped"),
                Err(e) => tracing::error!(error = %e, "HTTP server exited with error"),
            }
        });

        tracing::info!(address = %addr, "HTTP server starting");
        Ok(addr)
    }

    /// Apply middleware layers. The admission gate goes on last so it is the
    /// outermost layer: rejected requests never touch anything below it.
    #[allow(deprecated)]
    fn layered(&self, router: Router) -> Router {
        router
            .layer(TimeoutLayer::new(self.config.timeouts.request()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::from_fn_with_state(
                self.gate(),
                admission_middleware,
            ))
    }
}
