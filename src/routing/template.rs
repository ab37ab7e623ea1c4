//! Forwarding target templates.
//!
//! A template is a URL string with `{port}` and `{remainder}` placeholders.
//! It is split into segments once, when the route table is built, so that
//! rendering never re-scans captured text for placeholders.

use crate::routing::matcher::Captures;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Port,
    Remainder,
}

/// A parsed target template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl TargetTemplate {
    /// Parse a template. Braces that do not form a known placeholder are
    /// kept as literal text.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source.as_str();

        while !rest.is_empty() {
            let (segment, len) = if rest.starts_with("{port}") {
                (Some(Segment::Port), "{port}".len())
            } else if rest.starts_with("{remainder}") {
                (Some(Segment::Remainder), "{remainder}".len())
            } else {
                (None, rest.chars().next().map_or(1, char::len_utf8))
            };

            match segment {
                Some(segment) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                None => literal.push_str(&rest[..len]),
            }
            rest = &rest[len..];
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { source, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the template expects a captured port.
    pub fn uses_port(&self) -> bool {
        self.segments.contains(&Segment::Port)
    }

    /// Substitute captured values. A `{port}` placeholder with no captured
    /// port renders as nothing.
    pub fn render(&self, captures: &Captures<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + captures.remainder.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Port => {
                    if let Some(port) = captures.port {
                        out.push_str(&port.to_string());
                    }
                }
                Segment::Remainder => out.push_str(captures.remainder),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_port_and_remainder() {
        let template = TargetTemplate::parse("http://agents.local:{port}{remainder}");
        assert!(template.uses_port());
        let captures = Captures { remainder: "/x/y", port: Some(8123) };
        assert_eq!(template.render(&captures), "http://agents.local:8123/x/y");
    }

    #[test]
    fn test_placeholders_in_captured_text_are_not_expanded() {
        let template = TargetTemplate::parse("http://backend{remainder}");
        let captures = Captures { remainder: "/{port}", port: Some(8000) };
        assert_eq!(template.render(&captures), "http://backend/{port}");
    }

    #[test]
    fn test_unknown_braces_are_literal() {
        let template = TargetTemplate::parse("http://backend/{other}{remainder}");
        assert!(!template.uses_port());
        let captures = Captures { remainder: "/a", port: None };
        assert_eq!(template.render(&captures), "http://backend/{other}/a");
    }

    #[test]
    fn test_literal_only() {
        let template = TargetTemplate::parse("http://backend/dev-tmp/addons/default-properties");
        let captures = Captures { remainder: "", port: None };
        assert_eq!(
            template.render(&captures),
            "http://backend/dev-tmp/addons/default-properties"
        );
    }
}
