//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Share the process-wide backend HTTP client
//! - Bind server to listener with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::routing::{any, get};
use axum::Router;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{Authenticator, IdentityProvider};
use crate::config::ProxyConfig;
use crate::http::{forward, websocket};
use crate::lifecycle::ShutdownHandle;

/// Shared backend HTTP client (process-wide connection pool).
pub type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: BackendClient,
    pub authenticator: Arc<Authenticator>,
}

/// HTTP server for the intercom proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and identity
    /// collaborator.
    pub fn new(config: ProxyConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        // One client for all requests and sessions; TLS is delegated to the
        // connector.
        let client = Client::builder(TokioExecutor::new()).build(HttpsConnector::new());

        let state = AppState {
            config: Arc::new(config.clone()),
            client,
            authenticator: Arc::new(Authenticator::new(provider)),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/ha_intercom/ws", get(websocket::websocket_handler))
            .route("/api/ha_intercom", any(forward::proxy_handler))
            .route("/api/ha_intercom/{*tail}", any(forward::proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until the
    /// shutdown handle fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownHandle,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = ?self.config.backend.service_url,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
