//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_a_complete_file() {
        let file = write_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [shutdown]
            drain_timeout_ms = 500
            container_timeout_ms = 2000
            "#,
        );

        let config = load_config(file.path()).expect("loads");
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.shutdown.drain_timeout_ms, 500);
        assert_eq!(config.shutdown.container_timeout_ms, 2000);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/quiesce.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_config("listener = [broken");
        let err = load_config(file.path()).expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_problems_are_validation_errors() {
        let file = write_config(
            r#"
            [shutdown]
            drain_timeout_ms = 10
            container_timeout_ms = 5
            "#,
        );

        let err = load_config(file.path()).expect_err("invalid values");
        match err {
            ConfigError::Validation(errors) => assert!(!errors.is_empty()),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
