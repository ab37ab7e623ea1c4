//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → routing (port allow-list, dynamic path length guard)
//!     → headers.rs (sanitize, add X-Forwarded-*)
//!     → Forward to upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any routing validation failure
//! - No trust in client input

pub mod headers;
