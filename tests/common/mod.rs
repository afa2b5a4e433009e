//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use fanout_gateway::{GatewayConfig, GatewayServer, Shutdown};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    /// Path and query, as sent on the request line.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            headers: Vec::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(body: &str) -> Self {
        Self {
            content_type: "text/plain",
            body: body.to_string(),
            ..Self::json(Value::Null)
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            ..Self::json(Value::Null)
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Requests received by a mock backend, in arrival order.
pub type Recorded = Arc<Mutex<Vec<MockRequest>>>;

type Handler = Arc<dyn Fn(&MockRequest) -> MockResponse + Send + Sync>;

#[derive(Clone)]
struct MockState {
    handler: Handler,
    recorded: Recorded,
}

/// Start a mock backend on an ephemeral port. Every path and method is
/// answered by `handler`.
pub async fn start_backend<F>(handler: F) -> (SocketAddr, Recorded)
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
{
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        handler: Arc::new(handler),
        recorded: recorded.clone(),
    };
    let app = Router::new().fallback(handle_request).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (addr, recorded)
}

async fn handle_request(State(state): State<MockState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let captured = MockRequest {
        method: parts.method.to_string(),
        target: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let mock = (state.handler)(&captured);
    state.recorded.lock().unwrap().push(captured);

    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }

    let mut builder = Response::builder()
        .status(mock.status)
        .header(header::CONTENT_TYPE, mock.content_type);
    for (name, value) in &mock.headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(mock.body)).unwrap()
}

/// Run a gateway on an ephemeral port until the returned `Shutdown` triggers.
pub async fn start_gateway(server: GatewayServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.clone();

    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    (addr, shutdown)
}

pub fn parse_config(toml: &str) -> GatewayConfig {
    fanout_gateway::config::parse_config(toml).unwrap()
}
