//! Client response headers and outcome classification.
//!
//! # Responsibilities
//! - Mark every response as complete or incomplete
//! - Build the cache header for complete responses
//! - Classify the outcome of a request for logs and metrics

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

/// Set on every endpoint response.
pub const COMPLETE_RESPONSE_HEADER: HeaderName = HeaderName::from_static("x-gateway-completed");
pub const HEADER_COMPLETED: HeaderValue = HeaderValue::from_static("true");
pub const HEADER_INCOMPLETE: HeaderValue = HeaderValue::from_static("false");

/// Terminal state of one endpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Partial,
    TimedOut,
    Failed(StatusCode),
    MethodNotAllowed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Complete => "complete",
            Outcome::Partial => "partial",
            Outcome::TimedOut => "timeout",
            Outcome::Failed(_) => "failed",
            Outcome::MethodNotAllowed => "method_not_allowed",
        }
    }
}

pub fn mark_complete(headers: &mut HeaderMap, complete: bool) {
    let value = if complete {
        HEADER_COMPLETED
    } else {
        HEADER_INCOMPLETE
    };
    headers.insert(COMPLETE_RESPONSE_HEADER, value);
}

/// `public, max-age=N`, or `None` when caching is disabled.
pub fn cache_control(ttl: Duration) -> Option<HeaderValue> {
    let secs = ttl.as_secs();
    if secs == 0 {
        return None;
    }
    HeaderValue::from_str(&format!("public, max-age={secs}")).ok()
}

/// Copy backend headers without touching the completeness marker.
pub fn append_headers(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        if *name != COMPLETE_RESPONSE_HEADER {
            target.append(name.clone(), value.clone());
        }
    }
}

pub fn method_not_allowed() -> Response {
    status_response(StatusCode::METHOD_NOT_ALLOWED)
}

/// Empty body, given status, incomplete marker.
pub fn status_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    mark_complete(response.headers_mut(), false);
    response
}
