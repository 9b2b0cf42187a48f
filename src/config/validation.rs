//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout minimums, ports valid)
//! - Enforce the ordering between the drain and container timeouts
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, MIN_CONTAINER_TIMEOUT_MS, MIN_DRAIN_TIMEOUT_MS};

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("shutdown.drain_timeout_ms is {0}, minimum is {MIN_DRAIN_TIMEOUT_MS}")]
    DrainTimeoutTooSmall(u64),

    #[error("shutdown.container_timeout_ms is {0}, minimum is {MIN_CONTAINER_TIMEOUT_MS}")]
    ContainerTimeoutTooSmall(u64),

    #[error("shutdown.container_timeout_ms ({container}) must be greater than shutdown.drain_timeout_ms ({drain})")]
    ContainerNotAboveDrain { container: u64, drain: u64 },

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeoutZero,

    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let shutdown = &config.shutdown;
    if shutdown.drain_timeout_ms < MIN_DRAIN_TIMEOUT_MS {
        errors.push(ValidationError::DrainTimeoutTooSmall(
            shutdown.drain_timeout_ms,
        ));
    }
    if shutdown.container_timeout_ms < MIN_CONTAINER_TIMEOUT_MS {
        errors.push(ValidationError::ContainerTimeoutTooSmall(
            shutdown.container_timeout_ms,
        ));
    }
    if shutdown.container_timeout_ms <= shutdown.drain_timeout_ms {
        errors.push(ValidationError::ContainerNotAboveDrain {
            container: shutdown.container_timeout_ms,
            drain: shutdown.drain_timeout_ms,
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeoutZero);
    }

    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
