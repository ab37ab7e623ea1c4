//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn routing rejections into JSON error responses
//! - Prepare upstream responses for the client
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically
//! - Every gateway-generated error body is `{"error": "..."}`

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::routing::Rejection;
use crate::security::headers::strip_hop_by_hop;

impl IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body())).into_response()
    }
}

/// JSON error response in the gateway's format.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    let message: String = message.into();
    (status, Json(json!({ "error": message }))).into_response()
}

/// Strip hop-by-hop headers from an upstream response and box its body.
pub fn from_upstream<B>(response: Response<B>) -> axum::response::Response
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
