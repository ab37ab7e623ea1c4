//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variables read on top of the file.
pub const ENV_AGENT_SERVER_URL: &str = "AGENT_SERVER_URL";
pub const ENV_DEV_SERVER_URL: &str = "DEV_SERVER_URL";
pub const ENV_APP_SERVER_URL: &str = "APP_SERVER_URL";
pub const ENV_PORT: &str = "PORT";
pub const ENV_LOG_LEVEL: &str = "PROXY_LOG_LEVEL";

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML file without validating it.
fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Build the startup configuration: optional file, then environment, then
/// validation. Any failure is fatal to startup.
pub fn resolve_config(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(?config, "Configuration resolved");
    Ok(config)
}

/// Overlay environment values. Empty values count as unset.
pub fn apply_env_overrides(
    config: &mut ProxyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_AGENT_SERVER_URL) {
        config.upstream.agent_server_url = Some(url);
    }
    if let Some(url) = get(ENV_DEV_SERVER_URL) {
        config.upstream.dev_server_url = Some(url);
    }
    if let Some(url) = get(ENV_APP_SERVER_URL) {
        config.upstream.app_server_url = Some(url);
    }
    if let Some(port) = get(ENV_PORT) {
        config.listener.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            value: port.clone(),
        })?;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parses_partial_toml_with_defaults() {
        let config = parse_config(
            r#"
            [listener]
            port = 4000

            [upstream]
            agent_server_url = "http://agents:8080"

            [routing]
            dev_tools = false
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 4000);
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.routing.port_min, 8000);
        assert_eq!(config.routing.max_dynamic_path_len, 50);
        assert!(!config.routing.dev_tools);
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(parse_config("[listener\nport = 1"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_supplies_required_urls() {
        let config = resolve_config(
            None,
            env(&[
                (ENV_AGENT_SERVER_URL, "http://localhost:8080"),
                (ENV_DEV_SERVER_URL, "http://localhost:49483"),
                (ENV_PORT, "3100"),
            ]),
        )
        .unwrap();

        assert_eq!(config.upstream.agent_server_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.listener.port, 3100);
    }

    #[test]
    fn test_missing_agent_server_fails_fast() {
        let err = resolve_config(None, env(&[(ENV_DEV_SERVER_URL, "http://localhost:49483")]))
            .unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::MissingAgentServer]);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(&mut config, env(&[(ENV_AGENT_SERVER_URL, "  ")])).unwrap();
        assert!(config.upstream.agent_server_url.is_none());
    }

    #[test]
    fn test_bad_port_env() {
        let mut config = ProxyConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_PORT, .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = resolve_config(Some(Path::new("/definitely/not/here.toml")), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let path = std::env::temp_dir().join(format!("agent-proxy-{}.toml", std::process::id()));
        fs::write(
            &path,
            r#"
            [listener]
            port = 4000

            [upstream]
            agent_server_url = "http://from-file:8080"

            [routing]
            dev_tools = false
            "#,
        )
        .unwrap();

        let config = resolve_config(Some(&path), env(&[(ENV_AGENT_SERVER_URL, "http://from-env:8080")]));
        let _ = fs::remove_file(&path);
        let config = config.unwrap();

        assert_eq!(config.listener.port, 4000);
        assert_eq!(config.upstream.agent_server_url.as_deref(), Some("http://from-env:8080"));
    }
}
