//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Default deadline for an endpoint's whole backend fan-out.
    pub timeout_ms: u64,

    /// Default cache TTL for complete responses (0 disables Cache-Control).
    pub cache_ttl_secs: u64,

    /// Register the debug handler.
    pub debug_endpoint: bool,

    /// Register the echo handler.
    pub echo_endpoint: bool,

    /// Path prefix of the debug handler.
    pub debug_pattern: String,

    /// Path prefix of the echo handler.
    pub echo_pattern: String,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Public endpoints, each mapped to one or more backends.
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeout_ms: 2_000,
            cache_ttl_secs: 0,
            debug_endpoint: false,
            echo_endpoint: false,
            debug_pattern: "/__debug".to_string(),
            echo_pattern: "/__echo".to_string(),
            observability: ObservabilityConfig::default(),
            endpoints: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// A public endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Public path template, e.g. `/users/{user}`.
    pub url_pattern: String,

    /// Accepted HTTP method.
    #[serde(default = "default_method")]
    pub method: String,

    /// Identical calls raced per backend (bodiless requests only).
    #[serde(default = "default_concurrent_calls")]
    pub concurrent_calls: usize,

    /// Overrides the global timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Overrides the global cache TTL.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Inbound headers forwarded to backends (`*` forwards all).
    #[serde(default)]
    pub headers_to_pass: Vec<String>,

    /// Inbound query keys forwarded to backends (`*` forwards all).
    #[serde(default)]
    pub query_string: Vec<String>,

    /// Render used for the merged response.
    #[serde(default)]
    pub output_encoding: Option<String>,

    /// Run backends in declaration order.
    #[serde(default)]
    pub sequential: bool,

    pub backends: Vec<BackendConfig>,
}

/// One upstream call of an endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Upstream base URLs, e.g. "http://127.0.0.1:8000".
    pub host: Vec<String>,

    /// Backend path template.
    pub url_pattern: String,

    /// Response fields kept (empty keeps all).
    #[serde(default)]
    pub allow: Vec<String>,

    /// Response field renames, source -> target.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,

    /// Wrap the response under this key.
    #[serde(default)]
    pub group: Option<String>,

    /// Defaults to the endpoint method.
    #[serde(default)]
    pub method: Option<String>,

    /// Response decoding: json, string or no-op.
    #[serde(default)]
    pub encoding: Option<String>,

    /// Treat the response as a collection.
    #[serde(default)]
    pub is_collection: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_concurrent_calls() -> usize {
    1
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
