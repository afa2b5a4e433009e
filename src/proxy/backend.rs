//! Single backend call.
//!
//! # Responsibilities
//! - Resolve the backend path template for one request
//! - Forward the allowed headers, query and optional body
//! - Decode the upstream body by encoding and shape it
//!
//! # Design Decisions
//! - The first configured host is used (no balancing here)
//! - Every call is bounded by the request deadline
//! - Upstream 4xx/5xx become `ProxyError::UpstreamStatus`, except on no-op backends

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, Request, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde_json::{Map, Value};
use url::Url;

use super::error::ProxyError;
use super::request::RequestParts;
use super::response::{Metadata, ProxyResponse};
use super::shaping::Shaping;
use crate::observability::metrics;
use crate::resilience::RequestContext;
use crate::routing::{BackendEncoding, BackendSpec};
use crate::template::{Scope, Template};

/// Largest backend body decoded into memory.
pub const MAX_BACKEND_BODY: usize = 16 * 1024 * 1024;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Upstream headers a passthrough response never carries over.
const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

pub type HttpClient = Client<HttpConnector, Body>;

/// A compiled backend bound to an HTTP client.
pub struct BackendCaller {
    name: String,
    host: Url,
    method: Method,
    template: Template,
    encoding: BackendEncoding,
    is_collection: bool,
    shaping: Shaping,
    client: HttpClient,
}

impl BackendCaller {
    pub fn new(spec: &BackendSpec, client: HttpClient) -> Self {
        // Compilation guarantees at least one host.
        let host = spec.hosts[0].clone();
        Self {
            name: format!("{}{}", host.as_str().trim_end_matches('/'), spec.template.pattern()),
            host,
            method: spec.method.clone(),
            template: spec.template.clone(),
            encoding: spec.encoding,
            is_collection: spec.is_collection,
            shaping: Shaping::new(spec.allow.clone(), spec.mapping.clone(), spec.group.clone()),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the backend once. `responses` holds the shaped data of every
    /// backend that already ran in this sequence.
    pub async fn call(
        &self,
        ctx: &RequestContext,
        request: &RequestParts,
        body: Option<Body>,
        responses: &[Map<String, Value>],
    ) -> Result<ProxyResponse, ProxyError> {
        let scope = Scope {
            params: &request.params,
            responses,
            replacer: ctx.replacer(),
        };
        let path = self.template.resolve(&scope)?;
        let uri = self.target_uri(&path, &request.query)?;

        let mut builder = Request::builder().method(self.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers.clone();
            if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
                headers.insert(X_REQUEST_ID, value);
            }
        }
        let outbound = builder.body(body.unwrap_or_else(Body::empty))?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            backend = %self.name,
            method = %self.method,
            uri = %outbound.uri(),
            "Calling backend"
        );

        let response = match ctx.within(self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                metrics::record_backend_call(&self.name, "error");
                return Err(e.into());
            }
            Err(_) => {
                metrics::record_backend_call(&self.name, "timeout");
                return Err(ProxyError::DeadlineExceeded);
            }
        };

        let status = response.status();
        metrics::record_backend_call(&self.name, status.as_str());

        let (parts, incoming): (_, Incoming) = response.into_parts();
        let body = Body::new(incoming);

        // Passthrough forwards every status untouched.
        if self.encoding == BackendEncoding::Noop {
            let mut headers = parts.headers;
            for name in &HOP_BY_HOP {
                headers.remove(name);
            }
            return Ok(ProxyResponse {
                data: Map::new(),
                is_complete: true,
                metadata: Metadata {
                    status_code: Some(status),
                    headers,
                },
                io: Some(body),
            });
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(ProxyError::UpstreamStatus {
                backend: self.name.clone(),
                status,
            });
        }

        let bytes = match ctx.within(to_bytes(body, MAX_BACKEND_BODY)).await {
            Ok(bytes) => bytes?,
            Err(_) => return Err(ProxyError::DeadlineExceeded),
        };
        let data = decode(self.encoding, self.is_collection, &bytes)?;
        Ok(ProxyResponse::complete(self.shaping.apply(data)))
    }

    /// Join the resolved path onto the host and append the forwarded query.
    fn target_uri(
        &self,
        path: &str,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<Uri, ProxyError> {
        let (path, template_query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        let mut url = self.host.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{path}"));
        url.set_query(template_query.filter(|q| !q.is_empty()));

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, values) in query {
                for value in values {
                    pairs.append_pair(key, value);
                }
            }
        }

        url.as_str()
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Decode a backend body into a response map.
pub fn decode(
    encoding: BackendEncoding,
    is_collection: bool,
    bytes: &[u8],
) -> Result<Map<String, Value>, ProxyError> {
    match encoding {
        BackendEncoding::String => {
            let mut data = Map::new();
            data.insert(
                "content".to_string(),
                Value::String(String::from_utf8_lossy(bytes).into_owned()),
            );
            Ok(data)
        }
        BackendEncoding::Json | BackendEncoding::Noop => {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Map::new());
            }
            let value: Value = serde_json::from_slice(bytes)?;
            Ok(match value {
                Value::Object(map) if !is_collection => map,
                other => {
                    let collection = match other {
                        Value::Array(_) => other,
                        value => Value::Array(vec![value]),
                    };
                    let mut data = Map::new();
                    data.insert("collection".to_string(), collection);
                    data
                }
            })
        }
    }
}
