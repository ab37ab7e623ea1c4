//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the upstream request from the client request and a target URL
//! - Send it through the chosen client under the request timeout
//! - Map transport failures to 500 and timeouts to 504
//!
//! # Design Decisions
//! - The client's query string is appended to the target untouched
//! - Bodies are streamed, never buffered
//! - Upstream status codes and bodies pass through unchanged
//! - No retries

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::InvalidUri;
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::{error_response, from_upstream};
use crate::security::headers::forwarding_headers;
use crate::upstream::HttpClient;

/// Why a request could not be forwarded.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: InvalidUri,
    },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::InvalidUri { .. } | ForwardError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let message = match &self {
            ForwardError::Timeout(_) => "Upstream timed out",
            _ => "Proxy error",
        };
        error_response(self.status(), message)
    }
}

/// Append the query string of `original` to `target`.
pub fn target_uri(target: &str, original: &Uri) -> String {
    match original.query() {
        Some(query) => format!("{target}?{query}"),
        None => target.to_string(),
    }
}

/// Forward `request` to `target` and return the upstream response.
pub async fn forward(
    client: &HttpClient,
    request: Request<Body>,
    target: &str,
    peer: Option<SocketAddr>,
    timeout: Duration,
) -> Result<Response, ForwardError> {
    let (parts, body) = request.into_parts();

    let uri_string = target_uri(target, &parts.uri);
    let uri: Uri = uri_string
        .parse()
        .map_err(|source| ForwardError::InvalidUri {
            uri: uri_string.clone(),
            source,
        })?;
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or_default();
    let headers = forwarding_headers(parts.headers, authority, peer);

    // Request::new defaults to HTTP/1.1, which the upstream client speaks.
    let mut upstream = Request::new(body);
    *upstream.method_mut() = parts.method;
    *upstream.uri_mut() = uri;
    *upstream.headers_mut() = headers;

    let response = tokio::time::timeout(timeout, client.request(upstream))
        .await
        .map_err(|_| ForwardError::Timeout(timeout))??;

    Ok(from_upstream(response))
}
