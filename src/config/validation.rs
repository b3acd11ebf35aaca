//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses and URLs actually parse
//! - Detect duplicate or empty auth tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid URL in field '{field}': '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("auth token at index {0} is empty")]
    EmptyToken(usize),

    #[error("duplicate auth token for user '{0}'")]
    DuplicateToken(String),
}

/// Validate the loaded configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    check_url(&mut errors, "backend.service_url", &config.backend.service_url);
    check_url(&mut errors, "callback.external_url", &config.callback.external_url);
    check_url(&mut errors, "callback.internal_url", &config.callback.internal_url);

    let mut seen = HashSet::new();
    for (i, entry) in config.auth.tokens.iter().enumerate() {
        if entry.token.is_empty() {
            errors.push(ValidationError::EmptyToken(i));
        } else if !seen.insert(entry.token.as_str()) {
            errors.push(ValidationError::DuplicateToken(entry.user.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        if Url::parse(value).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenEntry;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.backend.service_url = Some("::bad::".into());
        config.auth.tokens.push(TokenEntry {
            token: String::new(),
            user: "alice".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        let mut config = ProxyConfig::default();
        for user in ["alice", "bob"] {
            config.auth.tokens.push(TokenEntry {
                token: "same".into(),
                user: user.into(),
            });
        }

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateToken("bob".into())]);
    }
}
