//! Endpoint compilation.
//!
//! # Responsibilities
//! - Turn an `EndpointConfig` into an immutable `EndpointSpec`
//! - Compile every backend path template once
//! - Reject endpoints the call plan cannot run safely
//!
//! # Design Decisions
//! - A failed endpoint is reported, never fatal for the others
//! - Non-GET methods are only allowed on the last backend of a multi-backend endpoint
//! - Chain references to later backends are configuration errors

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::{BackendConfig, EndpointConfig, GatewayConfig};
use crate::render;
use crate::template::{extract_params, ParamsSet, Template};

/// How a backend response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEncoding {
    Json,
    String,
    Noop,
}

impl BackendEncoding {
    /// Names other than `string` and `no-op` decode as JSON.
    pub fn from_name(name: &str) -> Self {
        match name {
            render::STRING => BackendEncoding::String,
            render::NOOP => BackendEncoding::Noop,
            _ => BackendEncoding::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),

    #[error("{method} endpoints with several backends only allow a non-GET method in the last backend")]
    NonIdempotentSequence { method: Method },

    #[error("endpoint declares no backends")]
    NoBackends,

    #[error("backend {index} declares no hosts")]
    NoHosts { index: usize },

    #[error("backend {index} has an invalid host {host:?}: {source}")]
    InvalidHost {
        index: usize,
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid path pattern {0:?}")]
    InvalidPattern(String),

    #[error("invalid route: {0}")]
    InvalidRoute(#[from] matchit::InsertError),

    #[error("backend {index} references a response that is not available yet: {{{reference}}}")]
    ForwardReference { index: usize, reference: String },

    #[error("concurrent_calls must be at least 1")]
    ZeroConcurrency,

    #[error("no-op encoding requires exactly one backend")]
    NoopWithSeveralBackends,

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },
}

/// A compiled public endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub path: String,
    pub method: Method,
    /// Parameter names of `path`.
    pub params: ParamsSet,
    pub concurrent_calls: usize,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub headers_to_pass: Vec<String>,
    pub query_string: Vec<String>,
    pub output_encoding: Option<String>,
    pub sequential: bool,
    pub backends: Vec<BackendSpec>,
}

/// A compiled backend call, owned by its endpoint.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub hosts: Vec<Url>,
    pub template: Template,
    pub method: Method,
    pub allow: Vec<String>,
    pub mapping: BTreeMap<String, String>,
    pub group: Option<String>,
    pub encoding: BackendEncoding,
    /// Declared encoding name, also the renderer key for single-backend endpoints.
    pub encoding_name: String,
    pub is_collection: bool,
}

impl EndpointSpec {
    pub fn compile(config: &EndpointConfig, gateway: &GatewayConfig) -> Result<Self, CompileError> {
        let method = parse_method(&config.method)?;
        validate_pattern(&config.url_pattern)?;

        if config.backends.is_empty() {
            return Err(CompileError::NoBackends);
        }
        if config.concurrent_calls == 0 {
            return Err(CompileError::ZeroConcurrency);
        }

        let params = extract_params(&config.url_pattern);
        let backends = config
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| BackendSpec::compile(index, backend, &method, &params))
            .collect::<Result<Vec<_>, _>>()?;

        if method != Method::GET && !is_valid_sequence(&backends) {
            return Err(CompileError::NonIdempotentSequence { method });
        }

        let passthrough = config.output_encoding.as_deref() == Some(render::NOOP)
            || backends.iter().any(|b| b.encoding == BackendEncoding::Noop);
        if passthrough && backends.len() > 1 {
            return Err(CompileError::NoopWithSeveralBackends);
        }

        let sequential = config.sequential || backends.iter().any(|b| b.template.is_chained());

        Ok(Self {
            path: config.url_pattern.clone(),
            method,
            params,
            concurrent_calls: config.concurrent_calls,
            timeout: Duration::from_millis(config.timeout_ms.unwrap_or(gateway.timeout_ms)),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs.unwrap_or(gateway.cache_ttl_secs)),
            headers_to_pass: config.headers_to_pass.clone(),
            query_string: config.query_string.clone(),
            output_encoding: config.output_encoding.clone().filter(|e| !e.is_empty()),
            sequential,
            backends,
        })
    }

    /// Encoding names declared by the backends, in order.
    pub fn backend_encodings(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.encoding_name.as_str()).collect()
    }
}

impl BackendSpec {
    fn compile(
        index: usize,
        config: &BackendConfig,
        endpoint_method: &Method,
        endpoint_params: &ParamsSet,
    ) -> Result<Self, CompileError> {
        if config.host.is_empty() {
            return Err(CompileError::NoHosts { index });
        }
        let hosts = config
            .host
            .iter()
            .map(|host| {
                Url::parse(host).map_err(|source| CompileError::InvalidHost {
                    index,
                    host: host.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !config.url_pattern.starts_with('/') {
            return Err(CompileError::InvalidPattern(config.url_pattern.clone()));
        }
        let template = Template::compile(&config.url_pattern, endpoint_params, index);
        if let Some(reference) = template.forward_references().next() {
            return Err(CompileError::ForwardReference {
                index,
                reference: reference.to_string(),
            });
        }

        let method = match config.method.as_deref() {
            Some(m) => parse_method(m)?,
            None => endpoint_method.clone(),
        };

        let encoding_name = match config.encoding.as_deref() {
            None | Some("") => render::JSON.to_string(),
            Some(name) => name.to_string(),
        };

        Ok(Self {
            hosts,
            template,
            method,
            allow: config.allow.clone(),
            mapping: config.mapping.clone(),
            group: config.group.clone().filter(|g| !g.is_empty()),
            encoding: BackendEncoding::from_name(&encoding_name),
            encoding_name,
            is_collection: config.is_collection,
        })
    }
}

fn parse_method(method: &str) -> Result<Method, CompileError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(CompileError::UnsupportedMethod(method.to_string())),
    }
}

/// Every backend but the last must be a GET.
fn is_valid_sequence(backends: &[BackendSpec]) -> bool {
    match backends.split_last() {
        Some((_, rest)) => rest.iter().all(|b| b.method == Method::GET),
        None => true,
    }
}

/// Public patterns use `{name}` and `{*name}` segments only.
pub(crate) fn validate_pattern(pattern: &str) -> Result<(), CompileError> {
    let legacy = pattern
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if !pattern.starts_with('/') || legacy {
        return Err(CompileError::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}
