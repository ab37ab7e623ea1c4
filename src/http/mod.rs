//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util auto builder, upgrade screening, Axum setup)
//!     → request.rs (request ID, upgrade detection)
//!     → routing layer decides Passthrough / Rewrite / Reject
//!     → forward.rs (HTTP) or websocket.rs (upgrade tunnel)
//!     → response.rs (strip hop-by-hop, JSON errors)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::ForwardError;
pub use request::{is_upgrade_request, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, ConnectionAborted, HttpServer};
pub use websocket::{TunnelError, UpgradeGuard};
