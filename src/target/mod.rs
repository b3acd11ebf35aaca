//! Backend target resolution.
//!
//! # Responsibilities
//! - Translate the configured backend base address between the HTTP and
//!   WebSocket scheme families (https↔wss, http↔ws)
//! - Build the HTTP forward target and the WebSocket connect target,
//!   injecting the fixed backend parameters (callback URL, derived token,
//!   companion audio host)
//! - Resolve the callback URL the backend uses to reach this host
//!
//! # Design Decisions
//! - A base with a scheme outside both families passes through unchanged;
//!   it is treated as already correct rather than rejected
//! - Caller-supplied query parameters are additive and never replace the
//!   parameters the resolver injects; pairs under the reserved names are
//!   dropped entirely
//! - The consumed `token` auth parameter is not forwarded upstream; the
//!   derived `haToken` replaces it

use axum::http::header::HOST;
use axum::http::HeaderMap;

use crate::config::CallbackConfig;

/// Fixed path prefix of the backend intercom API.
pub const BACKEND_PREFIX: &str = "api/ha_intercom";

/// Query keys owned by the resolver: the consumed auth `token` plus the
/// injected backend parameters. Caller-supplied pairs under these names are
/// dropped so they can never shadow the injected values.
const RESERVED_KEYS: [&str; 4] = ["token", "haUrl", "haToken", "audioHost"];

/// Translate a base address into the WebSocket scheme family.
pub fn ws_base(base: &str) -> String {
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        // Already ws/wss, or an unrecognized scheme: pass through.
        base.to_string()
    }
}

/// Translate a base address into the plain HTTP scheme family.
///
/// Exact inverse of [`ws_base`]; used for the companion `audioHost`
/// parameter.
pub fn http_base(base: &str) -> String {
    if let Some(rest) = base.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = base.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        base.to_string()
    }
}

/// Computes forward targets for one configured backend base address.
pub struct TargetResolver {
    base: String,
}

impl TargetResolver {
    /// Create a resolver for a configured base address. Trailing slashes are
    /// stripped before any path concatenation.
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// HTTP forward target: `<base>/api/ha_intercom/<tail>`, trailing slash
    /// stripped, caller query forwarded verbatim.
    pub fn http_target(&self, tail: &str, query: Option<&str>) -> String {
        let tail = tail.trim_start_matches('/');
        let mut url = format!("{}/{}/{}", self.base, BACKEND_PREFIX, tail);
        while url.ends_with('/') {
            url.pop();
        }
        match query {
            Some(q) if !q.is_empty() => format!("{url}?{q}"),
            _ => url,
        }
    }

    /// WebSocket connect target: `<ws-base>/api/ha_intercom/ws` plus the
    /// caller's query parameters (minus the reserved keys) and the fixed
    /// injected parameters.
    pub fn ws_target(
        &self,
        caller_query: Option<&str>,
        callback_url: Option<&str>,
        derived_token: Option<&str>,
    ) -> String {
        let url = format!("{}/{}/ws", ws_base(&self.base), BACKEND_PREFIX);

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(q) = caller_query {
            for (key, value) in url::form_urlencoded::parse(q.as_bytes()) {
                if !RESERVED_KEYS.contains(&key.as_ref()) {
                    query.append_pair(&key, &value);
                }
            }
        }
        if let Some(callback) = callback_url {
            query.append_pair("haUrl", callback);
        }
        if let Some(token) = derived_token {
            query.append_pair("haToken", token);
        }
        query.append_pair("audioHost", &http_base(&self.base));

        format!("{}?{}", url, query.finish())
    }
}

/// Resolve the address the backend should use to reach this host.
///
/// Priority: configured external address, configured internal address, then
/// the scheme+host observed on the inbound request. Exactly one source is
/// used; they are never combined.
pub fn resolve_callback_url(config: &CallbackConfig, headers: &HeaderMap) -> Option<String> {
    if let Some(url) = &config.external_url {
        return Some(url.trim_end_matches('/').to_string());
    }
    if let Some(url) = &config.internal_url {
        return Some(url.trim_end_matches('/').to_string());
    }

    let host = headers.get(HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}"))
}
