//! Response renderers.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     built-ins (json, json-collection, string, no-op)
//!     + RenderRegistry::register (custom renderers, any time)
//!
//! Per request (http::handler):
//!     output_encoding + backend encodings → RenderRegistry::select → Render
//!     Render + Option<ProxyResponse> → client response body
//! ```
//!
//! # Design Decisions
//! - Unknown names fall back to JSON, or to the single backend's encoding
//! - Lookups are per request, so late registrations apply to new requests
//! - A renderer only writes the body after it has serialized successfully

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use axum::response::Response;
use thiserror::Error;

use crate::proxy::ProxyResponse;

pub const JSON: &str = "json";
pub const JSON_COLLECTION: &str = "json-collection";
pub const STRING: &str = "string";
pub const NOOP: &str = "no-op";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("nothing to render")]
    EmptyResponse,

    #[error("{0}")]
    Custom(String),
}

/// Writes a `ProxyResponse` (or its absence) into a client response.
pub trait Renderer: Send + Sync {
    fn render(&self, out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&mut Response, Option<ProxyResponse>) -> Result<(), RenderError> + Send + Sync,
{
    fn render(&self, out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError> {
        self(out, response)
    }
}

/// A renderer resolved from the registry.
#[derive(Clone)]
pub enum Render {
    Json,
    JsonCollection,
    String,
    Noop,
    Custom(Arc<dyn Renderer>),
}

impl Render {
    pub fn render(&self, out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError> {
        match self {
            Render::Json => builtin::json(out, response),
            Render::JsonCollection => builtin::json_collection(out, response),
            Render::String => builtin::string(out, response),
            Render::Noop => builtin::noop(out, response),
            Render::Custom(renderer) => renderer.render(out, response),
        }
    }
}

impl fmt::Debug for Render {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Render::Json => f.write_str("Json"),
            Render::JsonCollection => f.write_str("JsonCollection"),
            Render::String => f.write_str("String"),
            Render::Noop => f.write_str("Noop"),
            Render::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Thread-safe map of renderer names to renderers.
pub struct RenderRegistry {
    renders: RwLock<HashMap<String, Render>>,
}

impl RenderRegistry {
    /// A registry holding the four built-in renderers.
    pub fn new() -> Self {
        let renders = HashMap::from([
            (JSON.to_string(), Render::Json),
            (JSON_COLLECTION.to_string(), Render::JsonCollection),
            (STRING.to_string(), Render::String),
            (NOOP.to_string(), Render::Noop),
        ]);
        Self {
            renders: RwLock::new(renders),
        }
    }

    /// Add or replace a renderer.
    pub fn register(&self, name: impl Into<String>, renderer: impl Renderer + 'static) {
        let name = name.into();
        tracing::debug!(render = %name, "Registering renderer");
        self.renders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Render::Custom(Arc::new(renderer)));
    }

    pub fn get(&self, name: &str) -> Option<Render> {
        self.renders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Pick the renderer for an endpoint.
    ///
    /// The fallback is JSON, or the encoding of the only backend when one is
    /// registered under that name. `output_encoding` wins when registered.
    pub fn select(&self, output_encoding: Option<&str>, backend_encodings: &[&str]) -> Render {
        let mut fallback = Render::Json;
        if let [encoding] = backend_encodings {
            if let Some(render) = self.get(encoding) {
                fallback = render;
            }
        }

        match output_encoding {
            Some(name) if !name.is_empty() => self.get(name).unwrap_or(fallback),
            _ => fallback,
        }
    }
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
