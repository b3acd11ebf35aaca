//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
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
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [backend]
            service_url = "http://backend.local:8080"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.backend.service_url.as_deref(),
            Some("http://backend.local:8080")
        );
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert!(config.backend.service_url.is_none());
        assert_eq!(config.timeouts.request_secs, 30);
    }
}
