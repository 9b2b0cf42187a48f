//! Quiesce demo service
//!
//! A small Axum service wired for graceful shutdown, built with Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │               QUIESCE DEMO SERVICE                 │
//!                  │                                                    │
//!   Client ───────▶│  admission ──▶ middleware ──▶ handlers             │
//!   Request        │  (permit)      (id, trace,    (/, /sleep,          │
//!                  │                 timeout)       /status)            │
//!                  │                                                    │
//!   SIGTERM ──────▶│  coordinator: close gate → drain in-flight         │
//!   SIGINT         │               → stop listeners → close runtime     │
//!                  │                                                    │
//!                  │  ┌───────────────────────────────────────────────┐ │
//!                  │  │ Cross-cutting: config, observability          │ │
//!                  │  └───────────────────────────────────────────────┘ │
//!                  └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;

use quiesce::config::{load_config, AppConfig};
use quiesce::http::HttpServer;
use quiesce::lifecycle::gate::AdmissionGate;
use quiesce::lifecycle::{signals, AppRuntime};
use quiesce::observability::{init_logging, init_metrics};

#[derive(Parser, Debug)]
#[command(name = "quiesce", version, about = "Demo service with graceful shutdown")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    init_logging(log_level);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        drain_timeout_ms = config.shutdown.drain_timeout_ms,
        container_timeout_ms = config.shutdown.container_timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let runtime = AppRuntime::new();
    let server = HttpServer::new(config);
    let gate = server.gate();

    let mut stop = runtime.subscribe();
    let stats_gate = gate.clone();
    runtime.register_task(
        "stats-reporter",
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        tracing::debug!(
                            active = stats_gate.active_requests(),
                            "Request stats"
                        );
                    }
                    _ = stop.recv() => break,
                }
            }
        }),
    );

    server.start(demo_router(gate)).await?;
    let coordinator = server.coordinator(Box::new(runtime));

    signals::wait_for_shutdown().await;
    coordinator.run().await?;

    Ok(())
}

#[derive(Clone)]
struct DemoState {
    gate: AdmissionGate,
}

fn demo_router(gate: AdmissionGate) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sleep/{millis}", get(sleep_handler))
        .route("/status", get(status_handler))
        .with_state(DemoState { gate })
}

async fn index() -> &'static str {
    "quiesce demo"
}

/// Hold a request open for the given number of milliseconds.
///
/// Handy for exercising the drain: start a slow request, send SIGTERM, and
/// watch it finish before the listeners stop.
async fn sleep_handler(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "finish"
}

#[derive(serde::Serialize)]
struct StatusBody {
    shutting_down: bool,
    active_requests: i64,
}

async fn status_handler(State(state): State<DemoState>) -> Json<StatusBody> {
    Json(StatusBody {
        shutting_down: state.gate.is_shutting_down(),
        active_requests: state.gate.active_requests(),
    })
}
