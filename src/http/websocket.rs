//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Authenticate before the upgrade; refuse the handshake otherwise
//! - Establish the backend WebSocket connection with injected parameters
//! - Bidirectional frame forwarding (text, binary, ping, pong, close)
//! - Coordinated shutdown when either side terminates
//!
//! # Data Flow
//! ```text
//! Client ←── WebSocket frames ──→ Proxy ←── WebSocket frames ──→ Backend
//! ```
//!
//! # Design Decisions
//! - The downstream handshake is accepted before the backend connect, so a
//!   connect failure is signaled over the open socket (close code 1011),
//!   not via an HTTP status
//! - Each relay direction is its own task; the two share nothing but the
//!   split connection halves, each sink written only by its owning direction
//! - First direction to finish wins: the other task is aborted and its
//!   cancellation joined before the session counts as closed
//! - Teardown never fails: close errors are swallowed and logged

use std::net::SocketAddr;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Extension, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::target::{resolve_callback_url, TargetResolver};

/// Backend side of a relay session.
type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_FAILED_REASON: &str = "Backend WebSocket connection failed";
const RELAY_FAILED_REASON: &str = "Unhandled WebSocket proxy error";

/// WebSocket upgrade handler.
///
/// Authentication happens before the upgrade completes, so unauthenticated
/// callers get a plain 401 and no socket is ever opened. The derived backend
/// token is minted here as well, bound to this connection's remote address.
pub async fn websocket_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    ambient: Option<Extension<Identity>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ProxyError> {
    let auth = state
        .authenticator
        .resolve(ambient.map(|Extension(identity)| identity), query.as_deref())
        .ok_or(ProxyError::Unauthorized)?;

    let base = state
        .config
        .backend
        .service_url
        .as_deref()
        .ok_or(ProxyError::NotConfigured)?;

    let resolver = TargetResolver::new(base);
    let callback_url = resolve_callback_url(&state.config.callback, &headers);
    let derived_token = state.authenticator.mint_derived_token(&auth, remote.ip());
    let target = resolver.ws_target(
        query.as_deref(),
        callback_url.as_deref(),
        derived_token.as_deref(),
    );

    let session = Uuid::new_v4();
    tracing::info!(
        session = %session,
        user = %auth.identity.user(),
        remote = %remote,
        "accepting websocket session"
    );

    Ok(ws.on_upgrade(move |socket| run_session(session, socket, target)))
}

/// Drive one relay session to completion.
async fn run_session(session: Uuid, mut downstream: WebSocket, target: String) {
    let upstream = match connect_async(target.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            tracing::warn!(session = %session, error = %err, "backend websocket connect failed");
            close_downstream(&mut downstream, close_code::ERROR, CONNECT_FAILED_REASON).await;
            return;
        }
    };

    metrics::record_session_opened();
    tracing::debug!(session = %session, "relaying");

    let (upstream_sink, upstream_stream) = upstream.split();
    let (downstream_sink, downstream_stream) = downstream.split();

    let mut to_upstream = tokio::spawn(relay_to_upstream(downstream_stream, upstream_sink));
    let mut to_downstream = tokio::spawn(relay_to_downstream(upstream_stream, downstream_sink));

    // First direction to finish wins. The lingering task is aborted and its
    // cancellation joined, so no relay loop outlives the session.
    let (finished, outcome) = tokio::select! {
        outcome = &mut to_upstream => {
            to_downstream.abort();
            let _ = to_downstream.await;
            ("downstream_to_upstream", outcome)
        }
        outcome = &mut to_downstream => {
            to_upstream.abort();
            let _ = to_upstream.await;
            ("upstream_to_downstream", outcome)
        }
    };

    match outcome {
        Ok(end) => {
            tracing::debug!(session = %session, direction = finished, end = ?end, "session closed")
        }
        Err(err) => {
            tracing::warn!(session = %session, direction = finished, error = %err, "relay task failed")
        }
    }
    metrics::record_session_closed();
}

/// How one relay direction ended.
#[derive(Debug)]
enum RelayEnd {
    /// The peer sent a close frame; it was propagated to the other side.
    PeerClosed,
    /// The peer disconnected without a close frame.
    PeerGone,
    /// A transport error ended the direction mid-stream.
    TransportError,
}

/// Relay loop: downstream client → backend.
async fn relay_to_upstream(
    mut rx: SplitStream<WebSocket>,
    mut tx: SplitSink<UpstreamSocket, UpstreamMessage>,
) -> RelayEnd {
    while let Some(received) = rx.next().await {
        let forward = match received {
            Ok(Message::Text(text)) => UpstreamMessage::Text(text.as_str().into()),
            Ok(Message::Binary(data)) => UpstreamMessage::Binary(data),
            // Pings are answered by pinging the opposite connection, not by
            // echoing locally.
            Ok(Message::Ping(data)) => UpstreamMessage::Ping(data),
            Ok(Message::Pong(data)) => UpstreamMessage::Pong(data),
            Ok(Message::Close(frame)) => {
                let _ = tx
                    .send(UpstreamMessage::Close(frame.map(close_to_upstream)))
                    .await;
                return RelayEnd::PeerClosed;
            }
            Err(_) => {
                let _ = tx
                    .send(UpstreamMessage::Close(Some(UpstreamCloseFrame {
                        code: CloseCode::Error,
                        reason: RELAY_FAILED_REASON.into(),
                    })))
                    .await;
                return RelayEnd::TransportError;
            }
        };

        metrics::record_frame("downstream_to_upstream");
        if tx.send(forward).await.is_err() {
            return RelayEnd::TransportError;
        }
    }

    let _ = tx.send(UpstreamMessage::Close(None)).await;
    RelayEnd::PeerGone
}

/// Relay loop: backend → downstream client.
async fn relay_to_downstream(
    mut rx: SplitStream<UpstreamSocket>,
    mut tx: SplitSink<WebSocket, Message>,
) -> RelayEnd {
    while let Some(received) = rx.next().await {
        let forward = match received {
            Ok(UpstreamMessage::Text(text)) => Message::Text(text.as_str().into()),
            Ok(UpstreamMessage::Binary(data)) => Message::Binary(data),
            Ok(UpstreamMessage::Ping(data)) => Message::Ping(data),
            Ok(UpstreamMessage::Pong(data)) => Message::Pong(data),
            Ok(UpstreamMessage::Close(frame)) => {
                let _ = tx
                    .send(Message::Close(frame.map(close_to_downstream)))
                    .await;
                return RelayEnd::PeerClosed;
            }
            // Raw frames only appear when manually assembling messages.
            Ok(UpstreamMessage::Frame(_)) => continue,
            Err(_) => {
                let _ = tx
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::ERROR,
                        reason: Utf8Bytes::from_static(RELAY_FAILED_REASON),
                    })))
                    .await;
                return RelayEnd::TransportError;
            }
        };

        metrics::record_frame("upstream_to_downstream");
        if tx.send(forward).await.is_err() {
            return RelayEnd::TransportError;
        }
    }

    let _ = tx.send(Message::Close(None)).await;
    RelayEnd::PeerGone
}

fn close_to_upstream(frame: CloseFrame) -> UpstreamCloseFrame {
    UpstreamCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.as_str().into(),
    }
}

fn close_to_downstream(frame: UpstreamCloseFrame) -> CloseFrame {
    CloseFrame {
        code: frame.code.into(),
        reason: Utf8Bytes::from(frame.reason.as_str()),
    }
}

/// Close the downstream socket, swallowing failures: teardown of an already
/// failing connection must always complete.
async fn close_downstream(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(err) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %err, "downstream close failed");
    }
}
