//! HTTP request forwarding.
//!
//! # Responsibilities
//! - Authenticate the caller (401 on failure)
//! - Rewrite the request URI to the configured backend target
//! - Forward only the allow-listed request headers
//! - Return backend status/headers/body verbatim minus transport headers
//!
//! # Design Decisions
//! - Only `Authorization` and `Content-Type` are forwarded upstream; the
//!   allow-list keeps host-internal headers away from the backend
//! - The body is buffered fully before forwarding; a failed body read
//!   forwards an empty body instead of failing the request
//! - No retry: a request whose body may have been consumed upstream is
//!   never resent (at-most-once forwarding)

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, Request, Uri};
use axum::response::Response;

use crate::auth::Identity;
use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::target::TargetResolver;

/// Path prefix the proxy itself is mounted on.
const PROXY_PREFIX: &str = "/api/ha_intercom";

/// Main proxy handler: forwards one request to the backend and returns one
/// response. Any method is accepted.
pub async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let ambient = parts.extensions.get::<Identity>().cloned();
    let auth = state
        .authenticator
        .resolve(ambient, parts.uri.query())
        .ok_or(ProxyError::Unauthorized)?;

    let base = state
        .config
        .backend
        .service_url
        .as_deref()
        .ok_or(ProxyError::NotConfigured)?;

    let tail = parts.uri.path().strip_prefix(PROXY_PREFIX).unwrap_or("");
    let resolver = TargetResolver::new(base);
    let target = resolver.http_target(tail, parts.uri.query());

    tracing::debug!(
        user = %auth.identity.user(),
        method = %parts.method,
        target = %target,
        "forwarding request"
    );

    // A body that cannot be read is forwarded as empty.
    let body_bytes = axum::body::to_bytes(body, state.config.security.max_body_size)
        .await
        .unwrap_or_default();

    let mut upstream_request = Request::new(Body::from(body_bytes));
    *upstream_request.method_mut() = parts.method.clone();
    *upstream_request.uri_mut() = Uri::try_from(target.as_str())?;
    *upstream_request.headers_mut() = filtered_request_headers(&parts.headers);

    let response = state.client.request(upstream_request).await?;

    metrics::record_forward(parts.method.as_str(), response.status().as_u16());

    let (mut response_parts, response_body) = response.into_parts();
    strip_transport_headers(&mut response_parts.headers);
    Ok(Response::from_parts(response_parts, Body::new(response_body)))
}

/// Copy only the allow-listed headers for the upstream request.
fn filtered_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [AUTHORIZATION, CONTENT_TYPE] {
        if let Some(value) = inbound.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}

/// Remove connection/transport-scoped headers from the backend response.
/// The response layer computes these fresh; passing them through would
/// double-specify the framing.
fn strip_transport_headers(headers: &mut HeaderMap) {
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_header_allow_list() {
        let mut inbound = HeaderMap::new();
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        inbound.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert("cookie", HeaderValue::from_static("session=s"));
        inbound.insert("x-internal", HeaderValue::from_static("1"));

        let filtered = filtered_request_headers(&inbound);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get(AUTHORIZATION).unwrap(), "Bearer t");
        assert!(filtered.get("cookie").is_none());
    }

    #[test]
    fn test_transport_headers_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-backend", HeaderValue::from_static("yes"));

        strip_transport_headers(&mut headers);
        assert!(headers.get(TRANSFER_ENCODING).is_none());
        assert!(headers.get(CONNECTION).is_none());
        assert_eq!(headers.get("x-backend").unwrap(), "yes");
    }
}
