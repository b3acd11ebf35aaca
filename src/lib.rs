//! Authenticating reverse proxy for the HA Intercom backend service.
//!
//! Sits in front of a backend intercom service and forwards both plain HTTP
//! requests and long-lived WebSocket sessions, injecting backend connection
//! parameters (callback URL, short-lived derived token, companion audio host)
//! resolved from the caller's identity.

// Core subsystems
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod target;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use auth::{Authenticator, IdentityProvider, StaticTokenProvider};
pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
