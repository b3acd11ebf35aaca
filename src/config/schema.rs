//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the intercom proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend intercom service configuration.
    pub backend: BackendConfig,

    /// Callback URL resolution for the front-facing host.
    pub callback: CallbackConfig,

    /// Token-based authentication settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend intercom service configuration.
///
/// The service URL is supplied by the surrounding integration; an absent URL
/// means the integration has not been initialized and every forward fails
/// with a 500.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend base address: scheme + host + optional port
    /// (e.g., "https://backend.example:9000").
    pub service_url: Option<String>,
}

/// How the backend reaches the front-facing host ("callback URL").
///
/// Exactly one source is chosen per resolution, in priority order:
/// external, internal, then the scheme+host observed on the inbound request.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CallbackConfig {
    /// Publicly reachable address of this host, if configured.
    pub external_url: Option<String>,

    /// Internally reachable address of this host, if configured.
    pub internal_url: Option<String>,
}

/// Token-based authentication settings.
///
/// Backs the config-driven [`crate::auth::StaticTokenProvider`] used by the
/// standalone binary. Deployments embedded in a host application supply
/// their own [`crate::auth::IdentityProvider`] instead.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted long-lived access tokens.
    pub tokens: Vec<TokenEntry>,
}

/// One accepted access token and the user it resolves to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenEntry {
    /// The bearer token value presented by the caller.
    pub token: String,

    /// The user the token belongs to.
    pub user: String,
}

/// Timeout configuration for HTTP forwarding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// WebSocket sessions are not subject to this timeout; only the
    /// upgrade response is.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size buffered before forwarding, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
