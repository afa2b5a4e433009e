//! Per-request host placeholder table.
//!
//! Host placeholders are the `{http.request.*}` names a backend template can
//! use to pull values out of the inbound request (headers, query, client
//! address). Path parameters are added under their literal names by the
//! request builder.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderMap};

use super::PlaceholderError;

const HEADER_PREFIX: &str = "http.request.header.";
const QUERY_PREFIX: &str = "http.request.uri.query.";

/// Substitution table built once per inbound request.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    values: HashMap<String, String>,
    headers: HeaderMap,
    query: Vec<(String, String)>,
}

impl Replacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the parts of `parts` that placeholders can reference.
    pub fn from_request(parts: &Parts, remote: Option<SocketAddr>) -> Self {
        let mut replacer = Self::new();

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default();
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());
        let query = parts.uri.query().unwrap_or_default();

        replacer.set("http.request.method", parts.method.as_str());
        replacer.set("http.request.host", host);
        replacer.set("http.request.uri", uri);
        replacer.set("http.request.uri.path", parts.uri.path());
        replacer.set("http.request.uri.query", query);
        if let Some(addr) = remote {
            replacer.set("http.request.remote.host", addr.ip().to_string());
        }
        if let Some(id) = parts.headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            replacer.set("http.request.id", id);
        }

        replacer.headers = parts.headers.clone();
        replacer.query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        replacer
    }

    /// Add or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look a placeholder up, `None` when the table has no such key.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }

        if let Some(name) = key.strip_prefix(HEADER_PREFIX) {
            let values: Vec<&str> = self
                .headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            return (!values.is_empty()).then(|| values.join(","));
        }

        if let Some(name) = key.strip_prefix(QUERY_PREFIX) {
            return self
                .query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone());
        }

        None
    }

    /// Strict lookup: unknown and empty values are both errors.
    pub fn resolve(&self, key: &str) -> Result<String, PlaceholderError> {
        match self.get(key) {
            None => Err(PlaceholderError::Unknown(key.to_string())),
            Some(value) if value.is_empty() => Err(PlaceholderError::Empty(key.to_string())),
            Some(value) => Ok(value),
        }
    }
}
