//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Configure HTTP/1.1 and HTTP/2 support, with upgrades
//! - Wire up middleware (tracing, limits, request ID)
//! - Accept connections from the listener until shutdown
//! - Dispatch requests to the routing engine
//! - Forward requests to upstream backends
//!
//! # Design Decisions
//! - Connections are served by hyper-util directly rather than `axum::serve`
//!   so a refused upgrade can drop the connection without a response
//! - All subsystems are built in `new`; a bad configuration never binds

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::forward::forward;
use crate::http::request::{is_upgrade_request, peer_addr, request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::error_response;
use crate::http::websocket::{self, UpgradeGuard};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::routing::{RouteDecision, RouteTable};
use crate::upstream::transport::build_client;
use crate::upstream::{HttpClient, PortTransportFactory, TransportCache, Upstreams};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub upstreams: Arc<Upstreams>,
    pub client: HttpClient,
    pub transports: Arc<TransportCache<PortTransportFactory>>,
    pub upgrades: UpgradeGuard,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ProxyConfig,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Validate `config` and build every subsystem from it.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let upstreams = Arc::new(Upstreams::from_config(&config.upstream)?);
        let routes = Arc::new(RouteTable::from_config(&config.routing, &upstreams)?);
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        let transports = Arc::new(TransportCache::new(PortTransportFactory::new(
            upstreams.agent_host(),
            connect_timeout,
        )));

        tracing::info!(
            agent_server = %upstreams.agent_origin(),
            app_server = upstreams.app_origin().as_deref().unwrap_or("-"),
            rules = ?routes.rule_names(),
            "Route table ready"
        );

        let state = AppState {
            upgrades: UpgradeGuard::new(Arc::clone(&routes), Arc::clone(&upstreams)),
            routes,
            upstreams,
            client: build_client(connect_timeout),
            transports,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            connect_timeout,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            state,
            config,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        // Backstop only; forwarding enforces request_secs itself and answers 504.
        let backstop = Duration::from_secs(config.timeouts.request_secs + config.timeouts.connect_secs);

        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(backstop))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Per-port transport cache shared with the handlers.
    pub fn transports(&self) -> Arc<TransportCache<PortTransportFactory>> {
        Arc::clone(&self.state.transports)
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = listener.max_connections(),
            "HTTP server starting"
        );

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            };

            let service = GatewayService {
                router: self.router.clone(),
                upgrades: self.state.upgrades.clone(),
                peer,
            };
            let guard = self.tracker.track();
            let drain = self.tracker.drain_signal();

            tokio::spawn(async move {
                let _permit = permit;
                serve_connection(stream, service, guard, drain).await;
            });
        }

        self.tracker.begin_drain();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        if tokio::time::timeout(grace, self.tracker.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Returned by the connection service to drop a connection without replying.
#[derive(Debug, Error)]
#[error("upgrade refused for {path}")]
pub struct ConnectionAborted {
    pub path: String,
}

/// Per-connection service: screens upgrades, then hands off to the router.
#[derive(Clone)]
struct GatewayService {
    router: Router,
    upgrades: UpgradeGuard,
    peer: SocketAddr,
}

impl hyper::service::Service<Request<Incoming>> for GatewayService {
    type Response = Response;
    type Error = ConnectionAborted;
    type Future = Pin<Box<dyn Future<Output = Result<Response, ConnectionAborted>> + Send>>;

    fn call(&self, mut request: Request<Incoming>) -> Self::Future {
        if is_upgrade_request(request.headers()) {
            let path = request.uri().path();
            if let Err(rejection) = self.upgrades.resolve(path) {
                tracing::warn!(
                    peer = %self.peer,
                    path = %path,
                    reason = rejection.reason,
                    "Refusing upgrade, closing connection"
                );
                metrics::record_rejection(rejection.reason);
                metrics::record_upgrade("terminated");
                let aborted = ConnectionAborted {
                    path: path.to_string(),
                };
                return Box::pin(std::future::ready(Err(aborted)));
            }
        }

        request.extensions_mut().insert(ConnectInfo(self.peer));
        let router = self.router.clone();
        Box::pin(async move {
            match router.oneshot(request).await {
                Ok(response) => Ok(response),
                Err(never) => match never {},
            }
        })
    }
}

async fn serve_connection(
    stream: TcpStream,
    service: GatewayService,
    guard: ConnectionGuard,
    mut drain: watch::Receiver<bool>,
) {
    let builder = Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = drain.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), error = %e, "Connection ended with error");
    }
}

/// Single entry point for every request.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(&request);

    if is_upgrade_request(request.headers()) {
        return websocket::handle_upgrade(&state, request).await;
    }

    let decision = state.routes.route(&method, &path);
    let kind = decision.kind();

    let response = match decision {
        RouteDecision::Reject(rejection) => {
            tracing::info!(
                request_id = %request_id,
                path = %path,
                status = rejection.status.as_u16(),
                reason = rejection.reason,
                "Request rejected"
            );
            metrics::record_rejection(rejection.reason);
            rejection.into_response()
        }
        RouteDecision::Rewrite(target) => {
            let client = match target.port {
                Some(port) => state.transports.get_or_create(port).client().clone(),
                None => state.client.clone(),
            };
            tracing::debug!(
                request_id = %request_id,
                rule = %target.rule,
                target = %target.url,
                port = ?target.port,
                "Rewriting request"
            );
            relay(&client, request, &target.url, &request_id, state.request_timeout).await
        }
        RouteDecision::Passthrough => match state.upstreams.app_origin() {
            Some(origin) => {
                let target = format!("{origin}{path}");
                relay(&state.client, request, &target, &request_id, state.request_timeout).await
            }
            None => error_response(StatusCode::NOT_FOUND, "Not found"),
        },
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), kind, start);
    response
}

async fn relay(
    client: &HttpClient,
    request: Request<Body>,
    target: &str,
    request_id: &str,
    timeout: Duration,
) -> Response {
    let peer = peer_addr(&request);
    match forward(client, request, target, peer, timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Upstream request failed");
            e.into_response()
        }
    }
}
