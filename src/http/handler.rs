//! Endpoint orchestration.
//!
//! # Responsibilities
//! - Reject requests whose method does not match the endpoint
//! - Build the `ProxyRequest` and run the proxy under the endpoint deadline
//! - Mark completeness, add cache headers, propagate backend headers
//! - Render the result, or respond with the error status
//!
//! # Design Decisions
//! - A deadline that fires without an error is still reported as an error
//! - Error statuses carry no body and skip rendering
//! - The renderer is looked up per request, never cached

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use uuid::Uuid;

use super::request::{build_proxy_request, X_REQUEST_ID};
use super::response::{
    append_headers, cache_control, mark_complete, method_not_allowed, status_response, Outcome,
};
use crate::observability::metrics;
use crate::proxy::{Proxy, ProxyError, ProxyResponse};
use crate::render::RenderRegistry;
use crate::resilience::RequestContext;
use crate::routing::EndpointSpec;
use crate::template::Replacer;

/// Serves one compiled endpoint.
pub struct EndpointHandler {
    spec: Arc<EndpointSpec>,
    proxy: Arc<dyn Proxy>,
    renders: Arc<RenderRegistry>,
    cache_control: Option<HeaderValue>,
}

impl EndpointHandler {
    pub fn new(spec: Arc<EndpointSpec>, proxy: Arc<dyn Proxy>, renders: Arc<RenderRegistry>) -> Self {
        Self {
            cache_control: cache_control(spec.cache_ttl),
            spec,
            proxy,
            renders,
        }
    }

    pub fn spec(&self) -> &EndpointSpec {
        &self.spec
    }

    /// Handle one inbound request. `params` are the matched path parameters.
    pub async fn handle(&self, request: Request<Body>, params: Vec<(String, String)>) -> Response {
        let started = Instant::now();
        let (parts, body) = request.into_parts();
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if parts.method != self.spec.method {
            tracing::debug!(
                request_id = %request_id,
                method = %parts.method,
                endpoint = %self.spec.path,
                "Method not allowed"
            );
            self.record(Outcome::MethodNotAllowed, started);
            return method_not_allowed();
        }

        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let mut replacer = Replacer::from_request(&parts, remote);
        let proxy_request = build_proxy_request(
            &parts,
            body,
            remote,
            &self.spec.query_string,
            &self.spec.headers_to_pass,
            &params,
            &mut replacer,
        );

        let ctx = RequestContext::new(self.spec.timeout, request_id, replacer);
        let result = ctx.within(self.proxy.call(&ctx, proxy_request)).await;
        let expired = ctx.is_expired();

        let (response, error) = match result {
            Ok(Ok(response)) => (Some(response), None),
            Ok(Err(e)) => (None, Some(e)),
            Err(_) => (None, Some(ProxyError::DeadlineExceeded)),
        };
        let (response, error) = settle(response, error, expired);

        if let Some(e) = &error {
            tracing::warn!(
                request_id = %ctx.request_id(),
                endpoint = %self.spec.path,
                error = %e,
                "Endpoint call returned an error"
            );
        }

        let (out, outcome) = self.respond(response, error, expired);
        self.record(outcome, started);
        out
    }

    fn respond(
        &self,
        response: Option<ProxyResponse>,
        error: Option<ProxyError>,
        expired: bool,
    ) -> (Response, Outcome) {
        let mut out = Response::new(Body::empty());

        let outcome = match &response {
            Some(r) if r.has_data() => {
                mark_complete(out.headers_mut(), r.is_complete);
                if r.is_complete {
                    if let Some(value) = &self.cache_control {
                        out.headers_mut().insert(header::CACHE_CONTROL, value.clone());
                    }
                    Outcome::Complete
                } else if expired || matches!(error, Some(ProxyError::DeadlineExceeded)) {
                    Outcome::TimedOut
                } else {
                    Outcome::Partial
                }
            }
            _ => {
                mark_complete(out.headers_mut(), false);
                if let Some(e) = &error {
                    let status = e.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    let outcome = if expired || matches!(e, ProxyError::DeadlineExceeded) {
                        Outcome::TimedOut
                    } else {
                        Outcome::Failed(status)
                    };
                    return (status_response(status), outcome);
                }
                Outcome::Partial
            }
        };

        if let Some(r) = response.as_ref().filter(|r| r.has_data()) {
            append_headers(out.headers_mut(), &r.metadata.headers);
        }

        let render = self.renders.select(
            self.spec.output_encoding.as_deref(),
            &self.spec.backend_encodings(),
        );
        match render.render(&mut out, response) {
            Ok(()) => (out, outcome),
            Err(e) => {
                tracing::error!(endpoint = %self.spec.path, error = %e, "Render failed");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status_response(status), Outcome::Failed(status))
            }
        }
    }

    fn record(&self, outcome: Outcome, started: Instant) {
        metrics::record_request(
            &self.spec.path,
            self.spec.method.as_str(),
            outcome.as_str(),
            started,
        );
    }
}

/// A deadline that fired without an error still counts as one, and a late
/// response is never complete.
fn settle(
    response: Option<ProxyResponse>,
    error: Option<ProxyError>,
    expired: bool,
) -> (Option<ProxyResponse>, Option<ProxyError>) {
    if !expired {
        return (response, error);
    }
    let response = response.map(|mut r| {
        r.is_complete = false;
        r
    });
    (response, error.or(Some(ProxyError::Internal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, EndpointConfig, GatewayConfig};
    use crate::http::response::COMPLETE_RESPONSE_HEADER;
    use crate::proxy::Metadata;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::Method;
    use serde_json::{json, Map, Value};
    use std::collections::BTreeMap;
    use std::time::Duration;

    enum Behavior {
        Respond(Value, bool),
        Fail(ProxyError),
        Sleep(Duration),
        Passthrough,
    }

    struct FakeProxy(Behavior);

    #[async_trait]
    impl Proxy for FakeProxy {
        async fn call(
            &self,
            _ctx: &RequestContext,
            _request: crate::proxy::ProxyRequest,
        ) -> Result<ProxyResponse, ProxyError> {
            match &self.0 {
                Behavior::Respond(value, complete) => {
                    let data: Map<String, Value> = value.as_object().cloned().unwrap_or_default();
                    let mut response = if *complete {
                        ProxyResponse::complete(data)
                    } else {
                        ProxyResponse::partial(data)
                    };
                    response
                        .metadata
                        .headers
                        .insert("x-backend", HeaderValue::from_static("users"));
                    Ok(response)
                }
                Behavior::Fail(ProxyError::UpstreamStatus { backend, status }) => {
                    Err(ProxyError::UpstreamStatus {
                        backend: backend.clone(),
                        status: *status,
                    })
                }
                Behavior::Fail(_) => Err(ProxyError::Internal),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(ProxyResponse::complete(Map::new()))
                }
                Behavior::Passthrough => Ok(ProxyResponse {
                    metadata: Metadata {
                        status_code: Some(StatusCode::ACCEPTED),
                        headers: Default::default(),
                    },
                    io: Some(Body::from("raw")),
                    is_complete: true,
                    ..ProxyResponse::default()
                }),
            }
        }
    }

    fn spec(timeout_ms: u64, cache_ttl_secs: u64, encoding: Option<&str>) -> EndpointSpec {
        let config = EndpointConfig {
            url_pattern: "/users/{user}".into(),
            method: "GET".into(),
            concurrent_calls: 1,
            timeout_ms: Some(timeout_ms),
            cache_ttl_secs: Some(cache_ttl_secs),
            headers_to_pass: Vec::new(),
            query_string: Vec::new(),
            output_encoding: None,
            sequential: false,
            backends: vec![BackendConfig {
                host: vec!["http://127.0.0.1:1".into()],
                url_pattern: "/registered/{user}".into(),
                allow: Vec::new(),
                mapping: BTreeMap::new(),
                group: None,
                method: None,
                encoding: encoding.map(str::to_string),
                is_collection: false,
            }],
        };
        EndpointSpec::compile(&config, &GatewayConfig::default()).unwrap()
    }

    fn handler(spec: EndpointSpec, behavior: Behavior) -> EndpointHandler {
        EndpointHandler::new(
            Arc::new(spec),
            Arc::new(FakeProxy(behavior)),
            Arc::new(RenderRegistry::new()),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_complete_response_is_cached() {
        let handler = handler(
            spec(1000, 3600, None),
            Behavior::Respond(json!({"id": 42}), true),
        );
        let response = handler
            .handle(get("/users/42"), vec![("user".into(), "42".into())])
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "true");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(response.headers()["x-backend"], "users");
        assert_eq!(body_string(response).await, r#"{"id":42}"#);
    }

    #[tokio::test]
    async fn test_partial_response_is_not_cached() {
        let handler = handler(
            spec(1000, 3600, None),
            Behavior::Respond(json!({"id": 42}), false),
        );
        let response = handler.handle(get("/users/42"), Vec::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "false");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn test_no_cache_header_without_ttl() {
        let handler = handler(spec(1000, 0, None), Behavior::Respond(json!({"id": 1}), true));
        let response = handler.handle(get("/users/1"), Vec::new()).await;
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "true");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn test_upstream_status_is_propagated_without_body() {
        let handler = handler(
            spec(1000, 3600, None),
            Behavior::Fail(ProxyError::UpstreamStatus {
                backend: "users".into(),
                status: StatusCode::NOT_FOUND,
            }),
        );
        let response = handler.handle(get("/users/42"), Vec::new()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "false");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_other_errors_become_500() {
        let handler = handler(spec(1000, 0, None), Behavior::Fail(ProxyError::Internal));
        let response = handler.handle(get("/users/42"), Vec::new()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_method_mismatch() {
        let handler = handler(spec(1000, 0, None), Behavior::Respond(json!({"id": 1}), true));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/1")
            .body(Body::empty())
            .unwrap();
        let response = handler.handle(request, Vec::new()).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "false");
    }

    #[tokio::test]
    async fn test_deadline_is_an_error() {
        let handler = handler(
            spec(20, 3600, None),
            Behavior::Sleep(Duration::from_millis(200)),
        );
        let response = handler.handle(get("/users/42"), Vec::new()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "false");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn test_empty_data_renders_empty_object() {
        let handler = handler(spec(1000, 3600, None), Behavior::Respond(json!({}), true));
        let response = handler.handle(get("/users/42"), Vec::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[COMPLETE_RESPONSE_HEADER], "false");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(body_string(response).await, "{}");
    }

    #[tokio::test]
    async fn test_passthrough_uses_backend_status() {
        let handler = handler(spec(1000, 0, Some("no-op")), Behavior::Passthrough);
        let response = handler.handle(get("/users/42"), Vec::new()).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, "raw");
    }

    #[tokio::test]
    async fn test_backend_encoding_selects_registered_renderer() {
        let renders = Arc::new(RenderRegistry::new());
        let handler = EndpointHandler::new(
            Arc::new(spec(1000, 0, Some("xml"))),
            Arc::new(FakeProxy(Behavior::Respond(json!({"id": 7}), true))),
            renders.clone(),
        );

        let response = handler.handle(get("/users/7"), Vec::new()).await;
        assert_eq!(body_string(response).await, r#"{"id":7}"#);

        renders.register(
            "xml",
            |out: &mut Response, _: Option<ProxyResponse>| -> Result<(), crate::render::RenderError> {
                *out.body_mut() = Body::from("<id>7</id>");
                Ok(())
            },
        );
        let response = handler.handle(get("/users/7"), Vec::new()).await;
        assert_eq!(body_string(response).await, "<id>7</id>");
    }

    #[test]
    fn test_settle_forces_error_on_expiry() {
        let (response, error) = settle(Some(ProxyResponse::complete(Map::new())), None, true);
        assert!(!response.unwrap().is_complete);
        assert!(matches!(error, Some(ProxyError::Internal)));

        let (_, error) = settle(None, None, false);
        assert!(error.is_none());
    }
}
