//! Forwarding transports.
//!
//! A `PortTransport` carries both directions of traffic for one worker port:
//! the pooled HTTP client for rewritten requests and the dial side for
//! WebSocket tunnels.

use std::time::Duration;

use axum::body::Body;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::upstream::cache::TransportFactory;

pub type HttpClient = Client<HttpConnector, Body>;

/// Client side of a tunnelled WebSocket.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Failure to open an upstream WebSocket.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("handshake did not complete within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Open a WebSocket to `url`, bounded by `connect_timeout`.
pub async fn dial_websocket(url: &str, connect_timeout: Duration) -> Result<UpstreamSocket, DialError> {
    match tokio::time::timeout(connect_timeout, connect_async(url)).await {
        Ok(result) => Ok(result?.0),
        Err(_) => Err(DialError::Timeout(connect_timeout)),
    }
}

/// Build a hyper client with the proxy's connect timeout.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Everything needed to reach one sibling worker port.
#[derive(Debug, Clone)]
pub struct PortTransport {
    port: u16,
    host: String,
    client: HttpClient,
    connect_timeout: Duration,
}

impl PortTransport {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// `ws://{host}:{port}`
    pub fn ws_origin(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Open a WebSocket to `path_and_query` on this port.
    pub async fn connect_websocket(&self, path_and_query: &str) -> Result<UpstreamSocket, DialError> {
        let url = format!("{}{}", self.ws_origin(), path_and_query);
        tracing::debug!(port = self.port(), url = %url, "Dialing worker WebSocket");
        dial_websocket(&url, self.connect_timeout).await
    }
}

/// Creates `PortTransport`s that target the agent server's host.
#[derive(Debug, Clone)]
pub struct PortTransportFactory {
    host: String,
    connect_timeout: Duration,
}

impl PortTransportFactory {
    pub fn new(host: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            connect_timeout,
        }
    }
}

impl TransportFactory for PortTransportFactory {
    type Transport = PortTransport;

    fn create(&self, port: u16) -> PortTransport {
        PortTransport {
            port,
            host: self.host.clone(),
            client: build_client(self.connect_timeout),
            connect_timeout: self.connect_timeout,
        }
    }
}
