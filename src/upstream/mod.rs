//! Upstream services.
//!
//! # Data Flow
//! ```text
//! UpstreamConfig (raw strings)
//!     → Upstreams::from_config (parse, normalize origins)
//!     → RouteTable templates (agent / dev origins, agent host)
//!
//! Dynamic-port rewrite at request time:
//!     port → cache.rs (get or create once)
//!          → transport.rs (per-port client and WebSocket dialer)
//! ```
//!
//! # Design Decisions
//! - Origins are stored without a trailing slash so templates can append paths
//! - One shared client for fixed upstreams, one transport per dynamic port
//! - Transports live for the whole process; the key space is bounded

pub mod cache;
pub mod transport;

use url::Url;

use crate::config::{ConfigError, UpstreamConfig, ValidationError};

pub use cache::{TransportCache, TransportFactory};
pub use transport::{dial_websocket, DialError, HttpClient, PortTransport, PortTransportFactory, UpstreamSocket};

/// Resolved upstream endpoints.
#[derive(Debug, Clone)]
pub struct Upstreams {
    agent_server: Url,
    agent_host: String,
    dev_server: Option<Url>,
    app_server: Option<Url>,
}

impl Upstreams {
    /// Parse the configured URLs. The agent server URL is mandatory.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let agent_raw = config
            .agent_server_url
            .as_deref()
            .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingAgentServer]))?;
        let agent_server = parse_origin("upstream.agent_server_url", agent_raw)?;
        let agent_host = agent_server
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ConfigError::Validation(vec![ValidationError::InvalidUrl {
                    field: "upstream.agent_server_url",
                    value: agent_raw.to_string(),
                    reason: "URL has no host".to_string(),
                }])
            })?;

        let dev_server = config
            .dev_server_url
            .as_deref()
            .map(|raw| parse_origin("upstream.dev_server_url", raw))
            .transpose()?;
        let app_server = config
            .app_server_url
            .as_deref()
            .map(|raw| parse_origin("upstream.app_server_url", raw))
            .transpose()?;

        Ok(Self {
            agent_server,
            agent_host,
            dev_server,
            app_server,
        })
    }

    /// Agent server base URL without a trailing slash.
    pub fn agent_origin(&self) -> String {
        origin(&self.agent_server)
    }

    /// Host name of the agent server; dynamic-port targets reuse it.
    pub fn agent_host(&self) -> &str {
        &self.agent_host
    }

    pub fn dev_origin(&self) -> Option<String> {
        self.dev_server.as_ref().map(origin)
    }

    /// Where passthrough traffic goes, if anywhere.
    pub fn app_origin(&self) -> Option<String> {
        self.app_server.as_ref().map(origin)
    }
}

/// Parse and check a configured upstream URL.
pub(crate) fn parse_origin(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| {
        ConfigError::Validation(vec![ValidationError::InvalidUrl {
            field,
            value: raw.to_string(),
            reason,
        }])
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("URL has no host".to_string()));
    }
    Ok(url)
}

fn origin(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Turn an `http(s)://` target into the matching `ws(s)://` URL.
pub fn websocket_url(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(agent: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            agent_server_url: agent.map(str::to_string),
            dev_server_url: None,
            app_server_url: Some("http://localhost:3001".to_string()),
        }
    }

    #[test]
    fn test_origins_drop_trailing_slash() {
        let upstreams = Upstreams::from_config(&config(Some("http://localhost:8080"))).unwrap();
        assert_eq!(upstreams.agent_origin(), "http://localhost:8080");
        assert_eq!(upstreams.agent_host(), "localhost");
        assert_eq!(upstreams.app_origin().as_deref(), Some("http://localhost:3001"));
        assert!(upstreams.dev_origin().is_none());

        let with_path = Upstreams::from_config(&config(Some("https://agents.example/base/"))).unwrap();
        assert_eq!(with_path.agent_origin(), "https://agents.example/base");
    }

    #[test]
    fn test_missing_agent_server_is_fatal() {
        let err = Upstreams::from_config(&config(None)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ref errors) if errors == &vec![ValidationError::MissingAgentServer]
        ));
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(Upstreams::from_config(&config(Some("ftp://files.example"))).is_err());
        assert!(Upstreams::from_config(&config(Some("not a url"))).is_err());
    }

    #[test]
    fn test_websocket_scheme_mapping() {
        assert_eq!(websocket_url("http://h:8000/x"), "ws://h:8000/x");
        assert_eq!(websocket_url("https://h/x"), "wss://h/x");
    }
}
