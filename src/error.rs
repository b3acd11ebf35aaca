//! Proxy error taxonomy.
//!
//! # Responsibilities
//! - Distinguish setup failures (auth, config, upstream connect) from
//!   failures inside an active relay
//! - Map setup failures to the HTTP status and JSON body the caller sees
//!
//! # Design Decisions
//! - Setup failures surface to the caller; relay failures are contained in
//!   the session and resolved by closing both sides
//! - No retry anywhere: forwarding is at-most-once

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced to the caller before or during a forward.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No ambient identity and no valid token.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend service URL has not been configured.
    #[error("backend service URL not configured")]
    NotConfigured,

    /// The upstream HTTP request failed at the transport level.
    #[error("upstream request failed: {0}")]
    UpstreamRequest(#[from] hyper_util::client::legacy::Error),

    /// The computed target URL was not a valid URI.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(#[from] axum::http::uri::InvalidUri),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamRequest(_) | ProxyError::InvalidTarget(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// The `error` field of the JSON body returned to the caller.
    fn public_message(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized => "Unauthorized",
            ProxyError::NotConfigured => "Integration not properly initialized",
            ProxyError::UpstreamRequest(_) | ProxyError::InvalidTarget(_) => {
                "Upstream request failed"
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "proxy request failed");
        }
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::NotConfigured.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_messages_are_stable() {
        assert_eq!(ProxyError::Unauthorized.public_message(), "Unauthorized");
        assert_eq!(
            ProxyError::NotConfigured.public_message(),
            "Integration not properly initialized"
        );
    }
}
