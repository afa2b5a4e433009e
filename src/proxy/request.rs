//! Outbound request descriptor.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use axum::body::Body;
use axum::http::{HeaderMap, Method};

/// Transport-agnostic description of the calls an inbound request turns into.
///
/// Built fresh for every inbound request by `http::request::build_proxy_request`.
pub struct ProxyRequest {
    pub method: Method,
    /// Inbound path, before any backend template is applied.
    pub path: String,
    /// Public path parameters extracted by the router.
    pub params: HashMap<String, String>,
    /// Forwarded headers, every value of a repeated header kept in order.
    pub headers: HeaderMap,
    pub query: BTreeMap<String, Vec<String>>,
    /// Read at most once; `None` when the inbound body is empty.
    pub body: Option<Body>,
}

/// Everything in a `ProxyRequest` except the body.
///
/// Shared by reference between the backend calls of one request.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, Vec<String>>,
}

impl ProxyRequest {
    pub fn into_parts(self) -> (RequestParts, Option<Body>) {
        let parts = RequestParts {
            method: self.method,
            path: self.path,
            params: self.params,
            headers: self.headers,
            query: self.query,
        };
        (parts, self.body)
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}
