//! Path matchers.
//!
//! # Responsibilities
//! - Match exact paths and path prefixes (case-sensitive)
//! - Capture the part of the path left after the matched prefix
//! - Capture and validate a port segment for dynamic-port paths
//!
//! # Design Decisions
//! - No regex: every matcher is a prefix check plus a single split
//! - Dynamic-port paths are length-checked before the port is looked at
//! - A matcher may refuse a request outright (`MatchOutcome::Invalid`)

use crate::routing::decision::Rejection;
use crate::routing::port::PortRange;

/// Values captured from a matched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captures<'a> {
    /// Path after the matched prefix, starting with `/` (or empty).
    pub remainder: &'a str,
    /// Port taken from the path, already validated.
    pub port: Option<u16>,
}

/// Result of evaluating a matcher against a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome<'a> {
    NoMatch,
    Matched(Captures<'a>),
    Invalid(Rejection),
}

/// Trait for matching request paths.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn evaluate<'a>(&self, path: &'a str) -> MatchOutcome<'a>;
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPath {
    path: String,
}

impl ExactPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPath {
    fn evaluate<'a>(&self, path: &'a str) -> MatchOutcome<'a> {
        if path == self.path {
            MatchOutcome::Matched(Captures { remainder: "", port: None })
        } else {
            MatchOutcome::NoMatch
        }
    }
}

/// Matches every path below a directory-style prefix such as `/api/agents/`.
///
/// The remainder keeps its leading slash, so `/api/agents/start` captures
/// `/start`.
#[derive(Debug, Clone)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    /// The prefix is normalized to end with `/`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }
}

impl Matcher for PathPrefix {
    fn evaluate<'a>(&self, path: &'a str) -> MatchOutcome<'a> {
        if path.starts_with(&self.prefix) {
            MatchOutcome::Matched(Captures {
                remainder: &path[self.prefix.len() - 1..],
                port: None,
            })
        } else {
            MatchOutcome::NoMatch
        }
    }
}

/// Matches `{prefix}/{port}` and `{prefix}/{port}/...`.
///
/// An empty remainder is reported as `/`.
#[derive(Debug, Clone)]
pub struct DynamicPortPath {
    prefix: String,
    range: PortRange,
    max_path_len: usize,
    default_port: Option<u16>,
}

impl DynamicPortPath {
    pub fn new(prefix: impl Into<String>, range: PortRange, max_path_len: usize) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            range,
            max_path_len,
            default_port: None,
        }
    }

    /// Route a bare `{prefix}` (or `{prefix}/`) to this port.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }
}

impl Matcher for DynamicPortPath {
    fn evaluate<'a>(&self, path: &'a str) -> MatchOutcome<'a> {
        let Some(rest) = path.strip_prefix(self.prefix.as_str()) else {
            return MatchOutcome::NoMatch;
        };

        // `/proxy` alone is an ordinary path unless a default port applies.
        if rest.is_empty() && self.default_port.is_none() {
            return MatchOutcome::NoMatch;
        }
        let bare = rest.is_empty() || rest == "/";
        if !bare && !rest.starts_with('/') {
            return MatchOutcome::NoMatch;
        }

        if path.len() > self.max_path_len {
            return MatchOutcome::Invalid(Rejection::path_too_long());
        }

        if bare {
            if let Some(port) = self.default_port {
                return MatchOutcome::Matched(Captures { remainder: "/", port: Some(port) });
            }
        }

        let after_slash = &rest[1..];
        let (segment, remainder) = match after_slash.find('/') {
            Some(idx) => (&after_slash[..idx], &after_slash[idx..]),
            None => (after_slash, "/"),
        };

        match self.range.parse(segment) {
            Ok(port) => MatchOutcome::Matched(Captures { remainder, port: Some(port) }),
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "Rejected dynamic port");
                MatchOutcome::Invalid(Rejection::invalid_port(self.range.min(), self.range.max()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_exact_matcher() {
        let matcher = ExactPath::new("/api/dev/v1/addons/default-properties");
        assert!(matches!(
            matcher.evaluate("/api/dev/v1/addons/default-properties"),
            MatchOutcome::Matched(_)
        ));
        assert_eq!(
            matcher.evaluate("/api/dev/v1/addons/default-properties/extra"),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn test_prefix_matcher() {
        let matcher = PathPrefix::new("/api/agents");

        match matcher.evaluate("/api/agents/start") {
            MatchOutcome::Matched(c) => assert_eq!(c.remainder, "/start"),
            other => panic!("unexpected {other:?}"),
        }
        match matcher.evaluate("/api/agents/") {
            MatchOutcome::Matched(c) => assert_eq!(c.remainder, "/"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(matcher.evaluate("/api/agents"), MatchOutcome::NoMatch);
        assert_eq!(matcher.evaluate("/api/agentsx/start"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_dynamic_port_capture() {
        let matcher = DynamicPortPath::new("/proxy", PortRange::WORKERS, 50);

        match matcher.evaluate("/proxy/8080/cmd/run") {
            MatchOutcome::Matched(c) => {
                assert_eq!(c.port, Some(8080));
                assert_eq!(c.remainder, "/cmd/run");
            }
            other => panic!("unexpected {other:?}"),
        }
        match matcher.evaluate("/proxy/8080") {
            MatchOutcome::Matched(c) => assert_eq!(c.remainder, "/"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_port_boundaries() {
        let matcher = DynamicPortPath::new("/proxy", PortRange::WORKERS, 50);
        assert_eq!(matcher.evaluate("/proxy"), MatchOutcome::NoMatch);
        assert_eq!(matcher.evaluate("/proxyfoo/8080"), MatchOutcome::NoMatch);
        assert!(matches!(matcher.evaluate("/proxy/"), MatchOutcome::Invalid(_)));
        assert!(matches!(matcher.evaluate("/proxy/abc/x"), MatchOutcome::Invalid(_)));
        assert!(matches!(matcher.evaluate("/proxy/22/x"), MatchOutcome::Invalid(_)));
    }

    #[test]
    fn test_length_guard_precedes_port_check() {
        let matcher = DynamicPortPath::new("/proxy", PortRange::WORKERS, 50);
        let long = format!("/proxy/8080/{}", "a".repeat(60));
        match matcher.evaluate(&long) {
            MatchOutcome::Invalid(rejection) => {
                assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
                assert_eq!(rejection.message, "Invalid request");
            }
            other => panic!("unexpected {other:?}"),
        }

        let exactly_fifty = format!("/proxy/8080/{}", "a".repeat(50 - "/proxy/8080/".len()));
        assert_eq!(exactly_fifty.len(), 50);
        assert!(matches!(matcher.evaluate(&exactly_fifty), MatchOutcome::Matched(_)));
    }

    #[test]
    fn test_default_port() {
        let matcher = DynamicPortPath::new("/ws", PortRange::WORKERS, 50).with_default_port(8765);
        for path in ["/ws", "/ws/"] {
            match matcher.evaluate(path) {
                MatchOutcome::Matched(c) => assert_eq!(c.port, Some(8765)),
                other => panic!("unexpected {other:?} for {path}"),
            }
        }
        match matcher.evaluate("/ws/8100") {
            MatchOutcome::Matched(c) => assert_eq!(c.port, Some(8100)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(matcher.evaluate("/wsx"), MatchOutcome::NoMatch);
    }
}
