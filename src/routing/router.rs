//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the ordered rule table
//! - Evaluate rules for plain requests and for WebSocket upgrades
//! - Produce exactly one `RouteDecision` per request
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - O(n) ordered scan, first match wins
//! - Unmatched requests fall back to `Passthrough`
//! - Reserved upgrade paths are checked before every rule

use axum::http::Method;

use crate::config::{ConfigError, RoutingConfig, ValidationError};
use crate::routing::decision::{Rejection, RewriteTarget, RouteDecision};
use crate::routing::matcher::{Captures, DynamicPortPath, ExactPath, MatchOutcome, Matcher, PathPrefix};
use crate::routing::template::TargetTemplate;
use crate::upstream::Upstreams;

/// What a matching rule does.
#[derive(Debug, Clone)]
pub enum RouteAction {
    Passthrough,
    Rewrite(TargetTemplate),
    Reject(Rejection),
}

/// One entry of the route table.
#[derive(Debug)]
pub struct RouteRule {
    name: String,
    matcher: Box<dyn Matcher>,
    methods: Option<Vec<Method>>,
    action: RouteAction,
}

impl RouteRule {
    pub fn new(name: impl Into<String>, matcher: impl Matcher + 'static, action: RouteAction) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
            methods: None,
            action,
        }
    }

    /// Restrict the rule to the given methods. Other methods skip the rule.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |allowed| allowed.contains(method))
    }

    fn decide(&self, captures: &Captures<'_>) -> RouteDecision {
        match &self.action {
            RouteAction::Passthrough => RouteDecision::Passthrough,
            RouteAction::Reject(rejection) => RouteDecision::Reject(rejection.clone()),
            RouteAction::Rewrite(template) => RouteDecision::Rewrite(RewriteTarget {
                rule: self.name.clone(),
                url: template.render(captures),
                port: if template.uses_port() { captures.port } else { None },
            }),
        }
    }
}

/// Upgrade path that always belongs to the application server.
pub const HOT_RELOAD_PATH: &str = "/_next/webpack-hmr";

/// Ordered, immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    reserved_upgrade_paths: Vec<String>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            reserved_upgrade_paths: Vec::new(),
        }
    }

    pub fn with_reserved_upgrade_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.reserved_upgrade_paths = paths.into_iter().collect();
        self
    }

    /// Build the gateway's rule table.
    ///
    /// Fails when dev tools are enabled without a dev server to send them to.
    pub fn from_config(config: &RoutingConfig, upstreams: &Upstreams) -> Result<Self, ConfigError> {
        let range = config.port_range();
        let agent = upstreams.agent_origin();
        let worker_template = format!("http://{}:{{port}}{{remainder}}", upstreams.agent_host());

        let mut rules = vec![RouteRule::new(
            "dynamic-port",
            DynamicPortPath::new("/proxy", range, config.max_dynamic_path_len),
            RouteAction::Rewrite(TargetTemplate::parse(worker_template.clone())),
        )
        .methods([Method::POST])];

        if config.websocket_proxy {
            rules.push(RouteRule::new(
                "websocket-port",
                DynamicPortPath::new("/ws", range, config.max_dynamic_path_len)
                    .with_default_port(config.default_websocket_port),
                RouteAction::Rewrite(TargetTemplate::parse(worker_template)),
            ));
        }

        rules.push(RouteRule::new(
            "agents",
            PathPrefix::new("/api/agents/"),
            RouteAction::Rewrite(TargetTemplate::parse(format!("{agent}{{remainder}}"))),
        ));
        rules.push(RouteRule::new(
            "vector",
            PathPrefix::new("/api/vector/"),
            RouteAction::Rewrite(TargetTemplate::parse(format!("{agent}/vector{{remainder}}"))),
        ));
        rules.push(RouteRule::new(
            "token",
            PathPrefix::new("/api/token/"),
            RouteAction::Rewrite(TargetTemplate::parse(format!("{agent}/token{{remainder}}"))),
        ));

        if config.dev_tools {
            rules.push(RouteRule::new(
                "dev-default-properties",
                ExactPath::new("/api/dev/v1/addons/default-properties"),
                RouteAction::Rewrite(TargetTemplate::parse(format!(
                    "{agent}/dev-tmp/addons/default-properties"
                ))),
            ));
            let dev = upstreams
                .dev_origin()
                .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingDevServer]))?;
            rules.push(RouteRule::new(
                "dev-designer",
                PathPrefix::new("/api/dev/"),
                RouteAction::Rewrite(TargetTemplate::parse(format!("{dev}/api/designer{{remainder}}"))),
            ));
        }

        Ok(Self::new(rules).with_reserved_upgrade_paths(config.reserved_upgrade_paths.clone()))
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(RouteRule::name).collect()
    }

    /// Route an ordinary request.
    pub fn route(&self, method: &Method, path: &str) -> RouteDecision {
        self.dispatch(method, path)
    }

    /// Route a WebSocket upgrade handshake.
    ///
    /// Reserved paths are always `Passthrough`. Any other path that no rule
    /// claims is rejected, since there is no application handler to fall
    /// back to mid-upgrade.
    pub fn route_upgrade(&self, path: &str) -> RouteDecision {
        if self.reserved_upgrade_paths.iter().any(|reserved| reserved == path) {
            return RouteDecision::Passthrough;
        }
        match self.dispatch(&Method::GET, path) {
            RouteDecision::Passthrough => RouteDecision::Reject(Rejection::unroutable_upgrade()),
            decision => decision,
        }
    }

    fn dispatch(&self, method: &Method, path: &str) -> RouteDecision {
        for rule in &self.rules {
            if !rule.applies_to(method) {
                continue;
            }
            match rule.matcher.evaluate(path) {
                MatchOutcome::NoMatch => continue,
                MatchOutcome::Invalid(rejection) => return RouteDecision::Reject(rejection),
                MatchOutcome::Matched(captures) => {
                    let decision = rule.decide(&captures);
                    tracing::debug!(rule = %rule.name, path = %path, decision = decision.kind(), "Route matched");
                    return decision;
                }
            }
        }
        RouteDecision::Passthrough
    }
}
