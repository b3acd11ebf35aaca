//! Shared utilities for integration testing.
#![allow(dead_code)] // not every test binary uses every helper

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use intercom_proxy::config::TokenEntry;
use intercom_proxy::{HttpServer, ProxyConfig, Shutdown, StaticTokenProvider};

/// The access token accepted by test proxies.
pub const TEST_TOKEN: &str = "sekrit-token";

/// A proxy instance running on an ephemeral port.
///
/// Holding the struct keeps the shutdown coordinator alive; dropping it
/// lets the server task stop.
pub struct TestProxy {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

/// Base config for tests: one valid token, given backend service URL.
pub fn test_config(service_url: Option<String>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.backend.service_url = service_url;
    config.auth.tokens.push(TokenEntry {
        token: TEST_TOKEN.into(),
        user: "alice".into(),
    });
    config
}

/// Start the proxy under test on an ephemeral port.
pub async fn spawn_proxy(config: ProxyConfig) -> TestProxy {
    let provider = Arc::new(StaticTokenProvider::new(&config.auth));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = shutdown.handle();
    let server = HttpServer::new(config, provider);
    tokio::spawn(async move {
        server.run(listener, handle).await.unwrap();
    });

    TestProxy {
        addr,
        _shutdown: shutdown,
    }
}

/// Start a mock HTTP backend that records each raw request (head and body)
/// and answers with the given canned HTTP response.
pub async fn start_capture_backend(
    response: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_http_request(&mut socket).await;
                let _ = tx.send(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Read one HTTP request (start line, headers, and Content-Length body)
/// from a raw socket.
async fn read_http_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Behavior of the mock WebSocket backend after the handshake.
pub enum WsBackendMode {
    /// Record every received frame and echo text/binary back.
    Echo,
    /// Send a close frame right after the handshake.
    CloseImmediately,
}

/// Start a mock WebSocket backend.
///
/// Returns the bound address, a channel with the handshake request URI of
/// each accepted connection, and a channel with every frame received.
pub async fn start_ws_backend(
    mode: WsBackendMode,
) -> (
    SocketAddr,
    mpsc::UnboundedReceiver<String>,
    mpsc::UnboundedReceiver<Message>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let echo = matches!(mode, WsBackendMode::Echo);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let uri_tx = uri_tx.clone();
            let frame_tx = frame_tx.clone();
            tokio::spawn(async move {
                let capture_uri = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = uri_tx.send(req.uri().to_string());
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, capture_uri).await
                else {
                    return;
                };

                if !echo {
                    let _ = ws.send(Message::Close(None)).await;
                    return;
                }

                // Keep reading past a close frame: the stream ends once the
                // close handshake completes, so anything sent after the
                // peer's close (e.g. a duplicate close) is still recorded.
                while let Some(Ok(msg)) = ws.next().await {
                    let data_frame =
                        matches!(msg, Message::Text(_) | Message::Binary(_));
                    let _ = frame_tx.send(msg.clone());
                    if data_frame && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, uri_rx, frame_rx)
}
