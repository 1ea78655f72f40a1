//! Path templates and captured parameters.
//!
//! A template is a `/`-separated list of segments. Each segment is either a
//! literal (`content`) or a named placeholder (`{id}`) that captures exactly
//! one path component:
//!
//! ```text
//! Template: /path/{id}/content/{another_field}/{final_field}
//!
//!  /path/7/content/a/b           match   id=7 another_field=a final_field=b
//!  /path/7/content/a             no match (segment count differs)
//!  /path/7/other/a/b             no match (literal differs)
//! ```
//!
//! Templates are validated here and then handed to the radix index in the
//! router, whose `{name}` syntax they share.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed, validated path template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// The template matching only `/`.
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn parse(template: &str) -> Result<Self, Error> {
        let invalid = |reason| Error::InvalidPath { template: template.to_owned(), reason };

        let rest = template.strip_prefix('/').ok_or_else(|| invalid("must start with `/`"))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty segment"));
            }
            let segment = match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if name.starts_with('*') {
                        return Err(invalid("catch-all parameters are not supported"));
                    }
                    if name.contains(['{', '}', '/']) {
                        return Err(invalid("malformed parameter"));
                    }
                    Segment::Param(name.to_owned())
                }
                None if raw.contains(['{', '}']) => return Err(invalid("braces inside a literal segment")),
                None => Segment::Literal(raw.to_owned()),
            };
            segments.push(segment);
        }

        let template = Self { segments };
        let names: Vec<&str> = template.param_names().collect();
        if names.iter().enumerate().any(|(i, name)| names[..i].contains(name)) {
            return Err(invalid("duplicate parameter name"));
        }
        Ok(template)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Prefixes `self` with `prefix`, as a route group does.
    pub fn nest_under(&self, prefix: &PathTemplate) -> Result<Self, Error> {
        let segments = prefix.segments.iter().chain(&self.segments).cloned().collect();
        let joined = Self { segments };
        // Re-parse to catch parameter names reused across the two halves.
        Self::parse(&joined.to_string())
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{text}")?,
                Segment::Param(name) => write!(f, "/{{{name}}}")?,
            }
        }
        Ok(())
    }
}

// ── Params ────────────────────────────────────────────────────────────────────

/// Captured path parameters, one entry per placeholder, in template order.
///
/// Values are the raw path components: no type coercion, no decoding beyond
/// what the transport already did. Serializes as a JSON object.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'k, 'v> FromIterator<(&'k str, &'v str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'k str, &'v str)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect())
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals_and_params() {
        let template = PathTemplate::parse("/path/{id}/content/{another_field}/{final_field}").unwrap();
        assert_eq!(template.segments().len(), 5);
        assert_eq!(template.segments()[2], Segment::Literal("content".into()));
        assert_eq!(
            template.param_names().collect::<Vec<_>>(),
            ["id", "another_field", "final_field"],
        );
    }

    #[test]
    fn display_round_trips_the_template() {
        for raw in ["/", "/echo", "/path/{id}/content/{a}/{b}"] {
            assert_eq!(PathTemplate::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_templates() {
        for raw in ["echo", "/echo/", "//echo", "/{}", "/{*rest}", "/a{b}", "/{id}/{id}"] {
            assert!(
                matches!(PathTemplate::parse(raw), Err(Error::InvalidPath { .. })),
                "`{raw}` should be rejected",
            );
        }
    }

    #[test]
    fn nesting_prefixes_segments() {
        let prefix = PathTemplate::parse("/counter_protected").unwrap();
        let route = PathTemplate::parse("/echo").unwrap();
        assert_eq!(route.nest_under(&prefix).unwrap().to_string(), "/counter_protected/echo");
        assert_eq!(route.nest_under(&PathTemplate::root()).unwrap(), route);
    }

    #[test]
    fn nesting_rejects_reused_param_names() {
        let prefix = PathTemplate::parse("/users/{id}").unwrap();
        let route = PathTemplate::parse("/posts/{id}").unwrap();
        assert!(route.nest_under(&prefix).is_err());
    }

    #[test]
    fn params_keep_template_order_and_serialize_as_object() {
        let params: Params = [("id", "7"), ("another_field", "a")].into_iter().collect();
        assert_eq!(params.get("another_field"), Some("a"));
        assert_eq!(params.iter().next(), Some(("id", "7")));
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"id": "7", "another_field": "a"}),
        );
    }
}
