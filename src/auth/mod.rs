//! Caller authentication.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → ambient identity attached by the host application (extension)?
//!         yes → AuthOutcome { identity, credential: None }
//!         no  → `token` query parameter?
//!             absent  → unauthenticated (caller rejects with 401)
//!             present → IdentityProvider::validate_token
//!                 invalid → unauthenticated
//!                 valid   → AuthOutcome { identity, credential: Some(..) }
//! ```
//!
//! # Design Decisions
//! - Absence of identity is a normal outcome, not an error; callers decide
//!   how to reject (401 body, or refused upgrade for WebSocket)
//! - The identity system itself is an external collaborator behind the
//!   [`IdentityProvider`] trait; token minting policy belongs to it
//! - The credential is only surfaced when the identity came from an explicit
//!   token, so derived backend tokens are never minted for session callers

use std::net::IpAddr;

/// Opaque principal representing the authenticated caller.
///
/// The host application may attach one to a request as an extension
/// (session/cookie auth); the relay only uses it to gate access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user: String,
}

impl Identity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    /// The user this identity resolves to, for logging.
    pub fn user(&self) -> &str {
        &self.user
    }
}

/// The bearer artifact behind a token-derived identity.
///
/// Owned by the authenticator for the duration of one request; usable to
/// mint further short-lived backend tokens.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// A resolved identity plus, for token-derived identities, the credential
/// behind it.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub identity: Identity,
    pub credential: Option<Credential>,
}

/// A validated token session returned by the identity collaborator.
#[derive(Debug, Clone)]
pub struct TokenSession {
    pub identity: Identity,
    pub credential: Credential,
}

/// External identity/session collaborator.
///
/// Validates presented tokens and mints derived, short-lived backend tokens.
/// Lifetime and scope of minted tokens are this collaborator's contract, not
/// the relay's.
pub trait IdentityProvider: Send + Sync {
    /// Validate a presented bearer token. `None` means invalid or expired.
    fn validate_token(&self, token: &str) -> Option<TokenSession>;

    /// Mint a short-lived backend token from a credential, bound to the
    /// caller's network address.
    fn mint_token(&self, credential: &Credential, remote_addr: IpAddr) -> Option<String>;
}

/// Resolves a caller's identity for one request.
pub struct Authenticator {
    provider: std::sync::Arc<dyn IdentityProvider>,
}

impl Authenticator {
    pub fn new(provider: std::sync::Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the caller behind a request.
    ///
    /// `ambient` is the identity the host application already attached, if
    /// any; `query` is the raw query string of the inbound request.
    pub fn resolve(&self, ambient: Option<Identity>, query: Option<&str>) -> Option<AuthOutcome> {
        if let Some(identity) = ambient {
            return Some(AuthOutcome {
                identity,
                credential: None,
            });
        }

        let token = token_param(query?)?;
        let session = self.provider.validate_token(&token)?;
        Some(AuthOutcome {
            identity: session.identity,
            credential: Some(session.credential),
        })
    }

    /// Mint a derived backend token for an authenticated caller, if the
    /// identity was token-derived.
    pub fn mint_derived_token(&self, outcome: &AuthOutcome, remote_addr: IpAddr) -> Option<String> {
        let credential = outcome.credential.as_ref()?;
        self.provider.mint_token(credential, remote_addr)
    }
}

/// Extract the `token` query parameter, if present.
fn token_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

/// Config-backed [`IdentityProvider`] for standalone deployments.
///
/// Accepts the fixed tokens from [`crate::config::AuthConfig`] and mints
/// opaque random derived tokens. Embedded deployments replace this with a
/// provider backed by the host's session store.
pub struct StaticTokenProvider {
    tokens: Vec<crate::config::TokenEntry>,
}

impl StaticTokenProvider {
    pub fn new(config: &crate::config::AuthConfig) -> Self {
        Self {
            tokens: config.tokens.clone(),
        }
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn validate_token(&self, token: &str) -> Option<TokenSession> {
        let entry = self.tokens.iter().find(|e| e.token == token)?;
        Some(TokenSession {
            identity: Identity::new(&entry.user),
            credential: Credential::new(&entry.token),
        })
    }

    fn mint_token(&self, credential: &Credential, remote_addr: IpAddr) -> Option<String> {
        // The minted token is opaque to the relay; binding to the caller
        // address keeps it useless elsewhere.
        if !self.tokens.iter().any(|e| e.token == credential.token()) {
            return None;
        }
        tracing::debug!(remote_addr = %remote_addr, "minting derived backend token");
        Some(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, TokenEntry};
    use std::sync::Arc;

    fn authenticator() -> Authenticator {
        let config = AuthConfig {
            tokens: vec![TokenEntry {
                token: "valid-token".into(),
                user: "alice".into(),
            }],
        };
        Authenticator::new(Arc::new(StaticTokenProvider::new(&config)))
    }

    #[test]
    fn test_ambient_identity_wins_without_credential() {
        let auth = authenticator();
        let outcome = auth
            .resolve(Some(Identity::new("bob")), Some("token=valid-token"))
            .unwrap();
        assert_eq!(outcome.identity.user(), "bob");
        assert!(outcome.credential.is_none());
    }

    #[test]
    fn test_valid_token_yields_credential() {
        let auth = authenticator();
        let outcome = auth.resolve(None, Some("id=abc&token=valid-token")).unwrap();
        assert_eq!(outcome.identity.user(), "alice");
        assert_eq!(outcome.credential.unwrap().token(), "valid-token");
    }

    #[test]
    fn test_missing_and_invalid_tokens_are_unauthenticated() {
        let auth = authenticator();
        assert!(auth.resolve(None, None).is_none());
        assert!(auth.resolve(None, Some("id=abc")).is_none());
        assert!(auth.resolve(None, Some("token=wrong")).is_none());
    }

    #[test]
    fn test_derived_token_only_for_token_callers() {
        let auth = authenticator();
        let addr: IpAddr = "127.0.0.1".parse().unwrap();

        let session_caller = auth.resolve(Some(Identity::new("bob")), None).unwrap();
        assert!(auth.mint_derived_token(&session_caller, addr).is_none());

        let token_caller = auth.resolve(None, Some("token=valid-token")).unwrap();
        assert!(auth.mint_derived_token(&token_caller, addr).is_some());
    }
}
