//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Decide where an upgrade handshake goes, or that it must be refused
//! - Complete upgrade handshake with client
//! - Establish WebSocket connection to the upstream
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Refused upgrades never get an HTTP response: `UpgradeGuard` runs at the
//!   connection layer and the connection is dropped
//! - The client upgrade completes before the upstream is dialled; an
//!   unreachable upstream just closes the client socket
//! - Worker ports are dialled through the same cached `PortTransport` that
//!   carries their HTTP traffic
//! - Close frames propagated in both directions
//! - Ping/pong forwarded like any other frame

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use crate::http::forward::target_uri;
use crate::http::request::request_id;
use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{Rejection, RewriteTarget, RouteDecision, RouteTable};
use crate::upstream::{dial_websocket, websocket_url, DialError, PortTransport, UpstreamSocket, Upstreams};

/// Rule name reported for upgrades handed to the application server.
const APP_SERVER_RULE: &str = "app-server";

/// Failure while tunnelling an accepted WebSocket.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to connect to upstream {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: DialError,
    },

    #[error("client socket error: {0}")]
    Client(#[source] axum::Error),

    #[error("upstream socket error: {0}")]
    Upstream(#[source] tokio_tungstenite::tungstenite::Error),
}

/// Resolves upgrade handshakes against the route table.
#[derive(Debug, Clone)]
pub struct UpgradeGuard {
    routes: Arc<RouteTable>,
    upstreams: Arc<Upstreams>,
}

impl UpgradeGuard {
    pub fn new(routes: Arc<RouteTable>, upstreams: Arc<Upstreams>) -> Self {
        Self { routes, upstreams }
    }

    /// HTTP(S) target for an upgrade on `path`, without the query string.
    ///
    /// A reserved path with no application server configured has nowhere
    /// to go and is refused like any unroutable path.
    pub fn resolve(&self, path: &str) -> Result<RewriteTarget, Rejection> {
        match self.routes.route_upgrade(path) {
            RouteDecision::Rewrite(target) => Ok(target),
            RouteDecision::Passthrough => self
                .upstreams
                .app_origin()
                .map(|origin| RewriteTarget {
                    rule: APP_SERVER_RULE.to_string(),
                    url: format!("{origin}{path}"),
                    port: None,
                })
                .ok_or_else(Rejection::unroutable_upgrade),
            RouteDecision::Reject(rejection) => Err(rejection),
        }
    }
}

/// How an accepted upgrade reaches its upstream.
enum Dial {
    /// Worker port, through the port's cached transport.
    Worker {
        transport: Arc<PortTransport>,
        path_and_query: String,
    },
    /// Fixed upstream URL.
    Fixed { url: String, connect_timeout: Duration },
}

impl Dial {
    fn describe(&self) -> String {
        match self {
            Dial::Worker {
                transport,
                path_and_query,
            } => format!("{}{}", transport.ws_origin(), path_and_query),
            Dial::Fixed { url, .. } => url.clone(),
        }
    }

    async fn connect(&self) -> Result<UpstreamSocket, TunnelError> {
        let dialed = match self {
            Dial::Worker {
                transport,
                path_and_query,
            } => transport.connect_websocket(path_and_query).await,
            Dial::Fixed {
                url,
                connect_timeout,
            } => dial_websocket(url, *connect_timeout).await,
        };
        dialed.map_err(|source| TunnelError::Connect {
            target: self.describe(),
            source,
        })
    }
}

/// Accept the client upgrade and tunnel it to its upstream.
pub async fn handle_upgrade(state: &AppState, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let path = request.uri().path().to_string();

    let target = match state.upgrades.resolve(&path) {
        Ok(target) => target,
        Err(rejection) => {
            // The connection layer refuses these first; only reachable when
            // the router is driven directly.
            metrics::record_upgrade("rejected");
            return rejection.into_response();
        }
    };

    let url = target_uri(&target.url, request.uri());
    let dial = match target.port {
        Some(port) => {
            let Ok(uri) = url.parse::<Uri>() else {
                tracing::error!(request_id = %request_id, target = %url, "Invalid upgrade target");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Proxy error");
            };
            Dial::Worker {
                transport: state.transports.get_or_create(port),
                path_and_query: uri.path_and_query().map_or("/", |pq| pq.as_str()).to_string(),
            }
        }
        None => Dial::Fixed {
            url: websocket_url(&url),
            connect_timeout: state.connect_timeout,
        },
    };

    let (mut parts, _body) = request.into_parts();
    let upgrade: WebSocketUpgrade =
        match <WebSocketUpgrade as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                tracing::warn!(request_id = %request_id, path = %path, "Malformed upgrade request");
                metrics::record_upgrade("malformed");
                return rejection.into_response();
            }
        };

    let described = dial.describe();
    tracing::info!(
        request_id = %request_id,
        path = %path,
        rule = %target.rule,
        target = %described,
        "Upgrading to WebSocket"
    );
    metrics::record_upgrade("accepted");

    upgrade.on_upgrade(move |socket| async move {
        let result = match dial.connect().await {
            Ok(upstream) => tunnel(socket, upstream).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::debug!(request_id = %request_id, target = %described, "WebSocket tunnel closed");
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "WebSocket tunnel failed");
                metrics::record_upgrade("tunnel_error");
            }
        }
    })
}

/// Relay frames between `client` and `upstream` until either side closes.
pub async fn tunnel(client: WebSocket, upstream: UpstreamSocket) -> Result<(), TunnelError> {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(message) = client_rx.next().await {
            let message = message.map_err(TunnelError::Client)?;
            let closing = matches!(message, Message::Close(_));
            upstream_tx
                .send(to_upstream(message))
                .await
                .map_err(TunnelError::Upstream)?;
            if closing {
                break;
            }
        }
        Ok::<(), TunnelError>(())
    };

    let upstream_to_client = async {
        while let Some(message) = upstream_rx.next().await {
            let message = message.map_err(TunnelError::Upstream)?;
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, Message::Close(_));
            client_tx.send(message).await.map_err(TunnelError::Client)?;
            if closing {
                break;
            }
        }
        Ok::<(), TunnelError>(())
    };

    tokio::select! {
        result = client_to_upstream => result,
        result = upstream_to_client => result,
    }
}

fn to_upstream(message: Message) -> UpstreamMessage {
    match message {
        Message::Text(text) => UpstreamMessage::Text(text.as_str().into()),
        Message::Binary(data) => UpstreamMessage::Binary(data),
        Message::Ping(data) => UpstreamMessage::Ping(data),
        Message::Pong(data) => UpstreamMessage::Pong(data),
        Message::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().into(),
        })),
    }
}

fn to_client(message: UpstreamMessage) -> Option<Message> {
    let message = match message {
        UpstreamMessage::Text(text) => Message::Text(text.as_str().into()),
        UpstreamMessage::Binary(data) => Message::Binary(data),
        UpstreamMessage::Ping(data) => Message::Ping(data),
        UpstreamMessage::Pong(data) => Message::Pong(data),
        UpstreamMessage::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    };
    Some(message)
}
