//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required upstreams are present and parse as http(s) URLs
//! - Validate value ranges (port band, limits, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::ProxyConfig;
use crate::config::ConfigError;
use crate::upstream::parse_origin;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("upstream.agent_server_url is required (env AGENT_SERVER_URL)")]
    MissingAgentServer,

    #[error("upstream.dev_server_url is required while routing.dev_tools is enabled (env DEV_SERVER_URL)")]
    MissingDevServer,

    #[error("{field} = {value:?} is not a usable URL: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("routing.port_min ({min}) is greater than routing.port_max ({max})")]
    InvertedPortRange { min: u16, max: u16 },

    #[error("routing.default_websocket_port ({port}) is outside {min}-{max}")]
    DefaultPortOutOfRange { port: u16, min: u16, max: u16 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("routing.reserved_upgrade_paths entry {0:?} must start with '/'")]
    InvalidReservedPath(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(
        &mut errors,
        "upstream.agent_server_url",
        config.upstream.agent_server_url.as_deref(),
        Some(ValidationError::MissingAgentServer),
    );
    check_url(
        &mut errors,
        "upstream.dev_server_url",
        config.upstream.dev_server_url.as_deref(),
        config
            .routing
            .dev_tools
            .then_some(ValidationError::MissingDevServer),
    );
    check_url(
        &mut errors,
        "upstream.app_server_url",
        config.upstream.app_server_url.as_deref(),
        None,
    );

    let routing = &config.routing;
    if routing.port_min > routing.port_max {
        errors.push(ValidationError::InvertedPortRange {
            min: routing.port_min,
            max: routing.port_max,
        });
    } else if routing.websocket_proxy && !routing.port_range().contains(routing.default_websocket_port) {
        errors.push(ValidationError::DefaultPortOutOfRange {
            port: routing.default_websocket_port,
            min: routing.port_min,
            max: routing.port_max,
        });
    }
    if routing.max_dynamic_path_len == 0 {
        errors.push(ValidationError::Zero { field: "routing.max_dynamic_path_len" });
    }
    for path in &routing.reserved_upgrade_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidReservedPath(path.clone()));
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_size" });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: Option<&str>,
    missing: Option<ValidationError>,
) {
    match value {
        Some(raw) => {
            if let Err(ConfigError::Validation(mut found)) = parse_origin(field, raw) {
                errors.append(&mut found);
            }
        }
        None => errors.extend(missing),
    }
}
