//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse args → Init logging → Load config → Bind listener → Serve
//!
//! Shutdown:
//!     SIGTERM/SIGINT (signals.rs)
//!         → Shutdown::trigger (shutdown.rs)
//!         → axum graceful shutdown drains connections
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownHandle};
