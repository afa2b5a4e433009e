//! Merged call-plan result.

use std::fmt;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};

/// Status override and headers a backend asked to propagate.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub status_code: Option<StatusCode>,
    pub headers: HeaderMap,
}

/// One logical response built from every backend of an endpoint.
#[derive(Default)]
pub struct ProxyResponse {
    pub data: Map<String, Value>,
    /// True iff every backend call succeeded before the deadline.
    pub is_complete: bool,
    pub metadata: Metadata,
    /// Raw upstream body for passthrough rendering.
    pub io: Option<Body>,
}

impl ProxyResponse {
    pub fn complete(data: Map<String, Value>) -> Self {
        Self {
            data,
            is_complete: true,
            ..Self::default()
        }
    }

    pub fn partial(data: Map<String, Value>) -> Self {
        Self {
            data,
            is_complete: false,
            ..Self::default()
        }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

impl fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("data", &self.data)
            .field("is_complete", &self.is_complete)
            .field("metadata", &self.metadata)
            .field("has_io", &self.io.is_some())
            .finish()
    }
}
