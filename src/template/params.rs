//! Placeholder translation over raw template strings.
//!
//! # Responsibilities
//! - Scan templates for `{name}` tokens
//! - Mark backend-local names so the call-plan compiler skips them
//! - Hand unconsumed marked names back to the host placeholder syntax
//!
//! # Design Decisions
//! - Pure functions, no I/O, no allocation when nothing matches
//! - Names outside `[A-Za-z0-9_.:/-]` are not parameters (raw braces pass through)
//! - Only runs at startup; request time works on the compiled `Template`

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Prefix that marks a name as deferred to the call-plan compiler.
pub const CHAIN_MARKER: &str = "resp_";

pub(crate) static PARAM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_.:/\-]+)\}").expect("valid param pattern"));

static MARKED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{resp_\.([A-Za-z0-9_.:/\-]+)\}").expect("valid marker pattern")
});

/// Set of parameter names found in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsSet(HashSet<String>);

impl ParamsSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names in `self` that are not in `other`.
    pub fn difference(&self, other: &ParamsSet) -> ParamsSet {
        ParamsSet(self.0.difference(&other.0).cloned().collect())
    }
}

impl FromIterator<String> for ParamsSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ParamsSet(iter.into_iter().collect())
    }
}

/// Collect every `{name}` token of `template`.
pub fn extract_params(template: &str) -> ParamsSet {
    PARAM_PATTERN
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Replace each `{name}` whose name is in `params` with its marked form.
pub fn rewrite_for_chaining(template: &str, params: &ParamsSet) -> String {
    PARAM_PATTERN
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            if params.contains(name) {
                mark_chain_placeholder(name)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Strip the marker from every marked token left in `template`.
pub fn rewrite_host_placeholders(template: &str) -> String {
    MARKED_PATTERN.replace_all(template, "{$1}").into_owned()
}

/// Marked form of a single name: `{resp_.name}`.
pub fn mark_chain_placeholder(name: &str) -> String {
    format!("{{{CHAIN_MARKER}.{name}}}")
}

/// Token body to match against when a marked name has to be recognised
/// during compilation.
pub(crate) fn strip_marker(token: &str) -> Option<&str> {
    token
        .strip_prefix(CHAIN_MARKER)
        .and_then(|rest| rest.strip_prefix('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ParamsSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_extract_params() {
        let params = extract_params("/users/{user}/orders/{order_id}/{user}");
        assert_eq!(params, set(&["user", "order_id"]));

        let params = extract_params("/tenants/{http.request.header.X-Tenant-Id}");
        assert!(params.contains("http.request.header.X-Tenant-Id"));
    }

    #[test]
    fn test_no_braces_is_identity() {
        let template = "/plain/path?x=1";
        assert!(extract_params(template).is_empty());
        assert_eq!(rewrite_for_chaining(template, &set(&["x"])), template);
        assert_eq!(rewrite_host_placeholders(template), template);
    }

    #[test]
    fn test_invalid_names_are_not_params() {
        let template = "/raw/{not a param}/{ok}";
        assert_eq!(extract_params(template), set(&["ok"]));
        assert_eq!(
            rewrite_for_chaining(template, &set(&["not a param"])),
            "/raw/{not a param}/{ok}"
        );
    }

    #[test]
    fn test_rewrite_for_chaining_only_touches_listed_names() {
        let rewritten = rewrite_for_chaining("/a/{user}/b/{id}", &set(&["id"]));
        assert_eq!(rewritten, "/a/{user}/b/{resp_.id}");
    }

    #[test]
    fn test_rewrite_for_chaining_marks_each_token_once() {
        assert_eq!(
            rewrite_for_chaining("/a/{x}/{resp_.x}", &set(&["x", "resp_.x"])),
            "/a/{resp_.x}/{resp_.resp_.x}"
        );
    }

    #[test]
    fn test_apply_host_placeholders() {
        let subject = "/tenants/{resp_.http.request.header.X-Tenant-Id}";
        assert_eq!(
            rewrite_host_placeholders(subject),
            "/tenants/{http.request.header.X-Tenant-Id}"
        );
    }

    #[test]
    fn test_marker_round_trip() {
        for name in ["id", "http.request.uri.query.page", "a:b/c-d"] {
            assert_eq!(
                rewrite_host_placeholders(&mark_chain_placeholder(name)),
                format!("{{{name}}}")
            );
        }
    }

    #[test]
    fn test_translation_is_idempotent() {
        let params = set(&["tenant", "id"]);
        let translate = |s: &str| rewrite_for_chaining(&rewrite_host_placeholders(s), &params);

        let once = translate("/t/{tenant}/{resp_.id}/{user}");
        assert_eq!(once, "/t/{resp_.tenant}/{resp_.id}/{user}");
        assert_eq!(translate(&once), once);
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_marker("resp_.name"), Some("name"));
        assert_eq!(strip_marker("resp0_.name"), None);
        assert_eq!(strip_marker("name"), None);
    }
}
