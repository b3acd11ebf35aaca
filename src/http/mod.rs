//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, state, middleware)
//!     → authentication (auth subsystem)
//!     → forward.rs  (single request/response forward)
//!       websocket.rs (long-lived bidirectional relay)
//!     → Send to client
//! ```

pub mod forward;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
