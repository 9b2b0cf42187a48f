//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use futures_util::future::BoxFuture;

use quiesce::config::AppConfig;
use quiesce::http::HttpServer;
use quiesce::lifecycle::RuntimeCloser;

/// A service instance bound to an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub server: HttpServer,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a demo app on 127.0.0.1:0 with the given shutdown timings.
pub async fn start_app(drain_timeout_ms: u64, container_timeout_ms: u64) -> TestApp {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.shutdown.drain_timeout_ms = drain_timeout_ms;
    config.shutdown.container_timeout_ms = container_timeout_ms;
    config.observability.metrics_enabled = false;

    let server = HttpServer::new(config);
    let router = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/sleep/{millis}", get(sleep_handler));
    let addr = server.start(router).await.expect("server binds");
    TestApp { addr, server }
}

async fn sleep_handler(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "finish"
}

/// Closer that records whether the final teardown ran.
pub struct RecordingCloser {
    closed: Arc<AtomicBool>,
}

impl RecordingCloser {
    pub fn new() -> (Box<Self>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        (
            Box::new(Self {
                closed: Arc::clone(&closed),
            }),
            closed,
        )
    }
}

impl RuntimeCloser for RecordingCloser {
    fn close(
        self: Box<Self>,
    ) -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Non-pooling client so every request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
