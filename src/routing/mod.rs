//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path, upgrade?)
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (exact / prefix / dynamic-port match, captures)
//!     → port.rs (allow-list check for captured ports)
//!     → template.rs (render forwarding target)
//!     → Return: Passthrough | Rewrite(target) | Reject(status, body)
//!
//! Table construction (at startup):
//!     RoutingConfig + resolved upstream URLs
//!     → fixed rule order
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same (method, path) always yields the same decision
//! - First match wins

pub mod decision;
pub mod matcher;
pub mod port;
pub mod router;
pub mod template;

pub use decision::{Rejection, RewriteTarget, RouteDecision};
pub use port::{PortError, PortRange};
pub use router::{RouteAction, RouteRule, RouteTable, HOT_RELOAD_PATH};
pub use template::TargetTemplate;
