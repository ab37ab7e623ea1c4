//! Routing outcomes.

use axum::http::StatusCode;
use serde_json::json;

/// What the router wants done with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hand the request to the application server untouched.
    Passthrough,
    /// Forward the request to a constructed upstream URL.
    Rewrite(RewriteTarget),
    /// Refuse the request.
    Reject(Rejection),
}

impl RouteDecision {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteDecision::Passthrough => "passthrough",
            RouteDecision::Rewrite(_) => "rewrite",
            RouteDecision::Reject(_) => "reject",
        }
    }
}

/// A forwarding target computed for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTarget {
    /// Name of the rule that produced this target.
    pub rule: String,
    /// Absolute target URL without the query string.
    pub url: String,
    /// Set when the target port came from the request path.
    pub port: Option<u16>,
}

/// A client error produced by routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
    /// Metric label.
    pub reason: &'static str,
}

impl Rejection {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            reason: "bad_request",
        }
    }

    pub(crate) fn invalid_port(min: u16, max: u16) -> Self {
        Self {
            reason: "invalid_port",
            ..Self::bad_request(format!(
                "Invalid port number. Port must be between {min} and {max}."
            ))
        }
    }

    pub(crate) fn path_too_long() -> Self {
        Self {
            reason: "path_too_long",
            ..Self::bad_request("Invalid request")
        }
    }

    pub(crate) fn unroutable_upgrade() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "No upgrade route for this path".to_string(),
            reason: "unroutable_upgrade",
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        json!({ "error": self.message })
    }
}
