//! Diagnostic endpoints.
//!
//! `debug` answers a fixed pong after logging what it received. `echo`
//! describes the inbound request back to the caller.

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Echoed bodies are cut at this size.
const MAX_ECHO_BODY: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub method: String,
    pub uri: String,
    pub path: String,
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

pub async fn debug_handler(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_ECHO_BODY).await.unwrap_or_default();
    tracing::debug!(
        method = %parts.method,
        uri = %parts.uri,
        headers = ?parts.headers,
        body = %String::from_utf8_lossy(&body),
        "Debug endpoint called"
    );
    Json(json!({ "message": "pong" })).into_response()
}

pub async fn echo_handler(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_ECHO_BODY).await.unwrap_or_default();

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &parts.headers {
        headers
            .entry(name.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes()) {
        query.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    Json(EchoResponse {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        path: parts.uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_debug_pong() {
        let request = Request::builder()
            .uri("/__debug/anything")
            .body(Body::from("hi"))
            .unwrap();
        let body = json_body(debug_handler(request).await).await;
        assert_eq!(body, json!({"message": "pong"}));
    }

    #[tokio::test]
    async fn test_echo_describes_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/__echo/a?x=1&x=2")
            .header("x-tag", "t")
            .body(Body::from("payload"))
            .unwrap();
        let body = json_body(echo_handler(request).await).await;

        assert_eq!(body["method"], "POST");
        assert_eq!(body["path"], "/__echo/a");
        assert_eq!(body["query"]["x"], json!(["1", "2"]));
        assert_eq!(body["headers"]["x-tag"], json!(["t"]));
        assert_eq!(body["body"], "payload");
    }
}
