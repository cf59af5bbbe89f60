//! Configuration loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration from a TOML string without validating it.
///
/// Used when CLI flags will be layered on top before validation runs.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = parse_config(
            r#"
            [listener]
            listen_port = 9000

            [coordination]
            endpoint = "10.0.0.1:2181,10.0.0.2:2181"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.listen_port, 9000);
        assert_eq!(config.coordination.endpoint, "10.0.0.1:2181,10.0.0.2:2181");
        // untouched sections fall back to defaults
        assert_eq!(config.listener.max_connections, 10_000);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(
            parse_config("listener = \"not a table\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
