//! Inbound request transformation.
//!
//! # Responsibilities
//! - Feed public path parameters into the host placeholder table
//! - Select the headers and query keys an endpoint forwards
//! - Add forwarding headers (client IP, host, gateway user agent)
//! - Hand the body over untouched, or drop it when empty
//!
//! # Design Decisions
//! - Allow-lists are exact; `*` forwards everything
//! - Wildcard header forwarding never copies Host or framing headers
//! - An allow-listed query key is forwarded even when its value is empty

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::proxy::ProxyRequest;
use crate::template::Replacer;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_VIA: HeaderName = HeaderName::from_static("x-forwarded-via");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Headers forwarded when an endpoint lists none.
pub const DEFAULT_HEADERS_TO_PASS: [&str; 1] = ["Content-Type"];

/// Sent upstream as `User-Agent`, or as `X-Forwarded-Via` if the client set one.
pub const USER_AGENT_VALUE: &str =
    concat!(env!("CARGO_PKG_NAME"), " Version ", env!("CARGO_PKG_VERSION"));

const WILDCARD: &str = "*";

/// Never copied by wildcard forwarding.
const SKIPPED_HEADERS: [HeaderName; 6] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Build the per-request `ProxyRequest` and complete the replacer.
pub fn build_proxy_request(
    parts: &Parts,
    body: Body,
    remote: Option<SocketAddr>,
    query_string: &[String],
    headers_to_pass: &[String],
    params: &[(String, String)],
    replacer: &mut Replacer,
) -> ProxyRequest {
    for (name, value) in params {
        replacer.set(name.clone(), value.clone());
    }

    let mut headers = select_headers(&parts.headers, headers_to_pass);
    add_forwarding_headers(&mut headers, parts, remote);

    ProxyRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        params: params.iter().cloned().collect(),
        headers,
        query: select_query(parts.uri.query(), query_string),
        body: (!body.is_end_stream()).then_some(body),
    }
}

fn select_headers(inbound: &HeaderMap, allow: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if allow.iter().any(|name| name == WILDCARD) {
        for (name, value) in inbound {
            if !SKIPPED_HEADERS.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        return headers;
    }

    let names: Vec<&str> = if allow.is_empty() {
        DEFAULT_HEADERS_TO_PASS.to_vec()
    } else {
        allow.iter().map(String::as_str).collect()
    };
    for name in names {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "Skipping invalid header name");
            continue;
        };
        for value in inbound.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn add_forwarding_headers(headers: &mut HeaderMap, parts: &Parts, remote: Option<SocketAddr>) {
    let client = client_ip(&parts.headers, remote).unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&client) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    let host = parts
        .headers
        .get(header::HOST)
        .cloned()
        .or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        })
        .unwrap_or_else(|| HeaderValue::from_static(""));
    headers.insert(X_FORWARDED_HOST, host);

    let agent = HeaderValue::from_static(USER_AGENT_VALUE);
    if headers.contains_key(header::USER_AGENT) {
        headers.insert(X_FORWARDED_VIA, agent);
    } else {
        headers.insert(header::USER_AGENT, agent);
    }
}

/// First hop of `X-Forwarded-For`, then `X-Real-Ip`, then the peer address.
fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real {
        return Some(ip.to_string());
    }

    remote.map(|addr| addr.ip().to_string())
}

/// Keep the allow-listed keys present in the query, empty values included.
fn select_query(query: Option<&str>, allow: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    if allow.iter().any(|key| key == WILDCARD) {
        return values;
    }
    allow
        .iter()
        .filter_map(|key| {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| (key.clone(), v.clone()))
        })
        .collect()
}
