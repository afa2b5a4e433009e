//! Compiled backend path templates.
//!
//! A backend `url_pattern` is compiled once at startup into a list of
//! segments. Each placeholder is classified by where its value comes from,
//! so request time only walks the list and looks values up.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::params::{
    extract_params, mark_chain_placeholder, rewrite_for_chaining, rewrite_host_placeholders,
    strip_marker, ParamsSet, PARAM_PATTERN,
};
use super::{PlaceholderError, Replacer};

static CHAIN_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^resp(\d+)_\.(.+)$").expect("valid chain reference pattern"));

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Public endpoint path parameter.
    EndpointParam(String),
    /// Field of an earlier backend response in the same sequence.
    ChainParam { index: usize, field: String },
    /// Value from the per-request host table.
    HostPlaceholder(String),
}

/// Values a template can draw from while resolving.
pub struct Scope<'a> {
    pub params: &'a HashMap<String, String>,
    pub responses: &'a [Map<String, Value>],
    pub replacer: &'a Replacer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile `pattern` for the backend at `position` of its endpoint.
    ///
    /// Names the endpoint does not declare are marked first. Marked names and
    /// chain references pointing at a backend that has not run yet end up as
    /// host placeholders.
    pub fn compile(pattern: &str, endpoint_params: &ParamsSet, position: usize) -> Self {
        let normalized = rewrite_host_placeholders(pattern);
        let deferred: ParamsSet = extract_params(&normalized)
            .difference(endpoint_params)
            .iter()
            .filter(|name| parse_chain_reference(name).is_none())
            .map(str::to_string)
            .collect();
        let marked = rewrite_for_chaining(&normalized, &deferred);

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PARAM_PATTERN.captures_iter(&marked) {
            let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(marked[last..whole.start()].to_string()));
            }
            segments.push(classify(token.as_str(), endpoint_params, position));
            last = whole.end();
        }
        if last < marked.len() {
            segments.push(Segment::Literal(marked[last..].to_string()));
        }

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written in configuration.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Indexes of the earlier backends this template reads from.
    pub fn chain_references(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::ChainParam { index, .. } => Some(*index),
            _ => None,
        })
    }

    pub fn is_chained(&self) -> bool {
        self.chain_references().next().is_some()
    }

    /// Host placeholders that still carry chain syntax, i.e. references to a
    /// backend at or after this one.
    pub fn forward_references(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::HostPlaceholder(name) if parse_chain_reference(name).is_some() => {
                Some(name.as_str())
            }
            _ => None,
        })
    }

    /// Produce the concrete path for one request.
    pub fn resolve(&self, scope: &Scope<'_>) -> Result<String, PlaceholderError> {
        let mut out = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::EndpointParam(name) => {
                    let value = scope
                        .params
                        .get(name)
                        .ok_or_else(|| PlaceholderError::MissingParam(name.clone()))?;
                    out.push_str(value);
                }
                Segment::ChainParam { index, field } => {
                    let value = scope
                        .responses
                        .get(*index)
                        .and_then(|data| lookup(data, field))
                        .and_then(value_to_segment)
                        .ok_or_else(|| PlaceholderError::MissingChainField {
                            index: *index,
                            field: field.clone(),
                        })?;
                    out.push_str(&value);
                }
                Segment::HostPlaceholder(name) => out.push_str(&scope.replacer.resolve(name)?),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::EndpointParam(name) => write!(f, "{{{name}}}")?,
                Segment::ChainParam { index, field } => write!(f, "{{resp{index}_.{field}}}")?,
                Segment::HostPlaceholder(name) => f.write_str(&mark_chain_placeholder(name))?,
            }
        }
        Ok(())
    }
}

fn classify(token: &str, endpoint_params: &ParamsSet, position: usize) -> Segment {
    if endpoint_params.contains(token) {
        return Segment::EndpointParam(token.to_string());
    }
    if let Some(name) = strip_marker(token) {
        return Segment::HostPlaceholder(name.to_string());
    }
    match parse_chain_reference(token) {
        Some((index, field)) if index < position => Segment::ChainParam {
            index,
            field: field.to_string(),
        },
        _ => Segment::HostPlaceholder(token.to_string()),
    }
}

/// Split `respN_.field` into `(N, field)`.
pub(crate) fn parse_chain_reference(token: &str) -> Option<(usize, &str)> {
    let caps = CHAIN_REFERENCE.captures(token)?;
    let index = caps.get(1)?.as_str().parse().ok()?;
    Some((index, caps.get(2)?.as_str()))
}

/// Follow a dotted path through nested objects.
pub(crate) fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn value_to_segment(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint(pattern: &str) -> ParamsSet {
        extract_params(pattern)
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_classifies_each_namespace() {
        let template = Template::compile(
            "/registered/{user}/orders/{resp0_.id}/{http.request.header.X-Tenant-Id}",
            &endpoint("/users/{user}"),
            1,
        );

        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("/registered/".into()),
                Segment::EndpointParam("user".into()),
                Segment::Literal("/orders/".into()),
                Segment::ChainParam { index: 0, field: "id".into() },
                Segment::Literal("/".into()),
                Segment::HostPlaceholder("http.request.header.X-Tenant-Id".into()),
            ]
        );
        assert!(template.is_chained());
        assert_eq!(template.forward_references().count(), 0);
    }

    #[test]
    fn test_first_backend_cannot_consume_chain_references() {
        let template = Template::compile("/x/{resp0_.id}", &ParamsSet::default(), 0);
        assert!(!template.is_chained());
        assert_eq!(template.forward_references().collect::<Vec<_>>(), vec!["resp0_.id"]);
    }

    #[test]
    fn test_legacy_marked_placeholders_are_normalized() {
        let template = Template::compile(
            "/tenants/{resp_.http.request.header.X-Tenant-Id}",
            &ParamsSet::default(),
            0,
        );
        assert_eq!(
            template.segments()[1],
            Segment::HostPlaceholder("http.request.header.X-Tenant-Id".into())
        );
        assert_eq!(template.to_string(), "/tenants/{resp_.http.request.header.X-Tenant-Id}");
    }

    #[test]
    fn test_plain_template_is_one_literal() {
        let template = Template::compile("/health", &ParamsSet::default(), 0);
        assert_eq!(template.segments(), &[Segment::Literal("/health".into())]);
        assert_eq!(template.to_string(), "/health");
    }

    #[test]
    fn test_resolve() {
        let template = Template::compile(
            "/u/{user}/o/{resp0_.order.id}/t/{http.request.header.X-Tenant-Id}",
            &endpoint("/users/{user}"),
            1,
        );
        let params = HashMap::from([("user".to_string(), "42".to_string())]);
        let responses = vec![object(json!({"order": {"id": 7}}))];
        let mut replacer = Replacer::new();
        replacer.set("http.request.header.X-Tenant-Id", "acme");

        let path = template
            .resolve(&Scope {
                params: &params,
                responses: &responses,
                replacer: &replacer,
            })
            .unwrap();
        assert_eq!(path, "/u/42/o/7/t/acme");
    }

    #[test]
    fn test_resolve_missing_values() {
        let template = Template::compile("/o/{resp0_.missing}", &ParamsSet::default(), 1);
        let params = HashMap::new();
        let responses = vec![object(json!({"id": 1}))];
        let replacer = Replacer::new();
        let err = template
            .resolve(&Scope {
                params: &params,
                responses: &responses,
                replacer: &replacer,
            })
            .unwrap_err();
        assert!(matches!(err, PlaceholderError::MissingChainField { index: 0, .. }));

        let template = Template::compile("/h/{unknown}", &ParamsSet::default(), 0);
        let err = template
            .resolve(&Scope {
                params: &params,
                responses: &[],
                replacer: &replacer,
            })
            .unwrap_err();
        assert!(matches!(err, PlaceholderError::Unknown(name) if name == "unknown"));
    }

    #[test]
    fn test_endpoint_param_shadows_backend_field() {
        let template = Template::compile("/a/{id}", &endpoint("/items/{id}"), 1);
        assert_eq!(template.segments()[1], Segment::EndpointParam("id".into()));
    }
}
