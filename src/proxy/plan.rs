//! Call plans: how the backends of one endpoint are combined.
//!
//! # Responsibilities
//! - Run backends in parallel, or in order when later ones read earlier responses
//! - Merge shaped backend data into one response
//! - Report completeness: partial data survives individual backend failures
//!
//! # Design Decisions
//! - Only the last backend receives the inbound body
//! - `concurrent_calls > 1` races identical bodiless calls, first success wins
//! - A sequence stops at its first failure

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use futures_util::future::{join_all, select_ok};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::{Map, Value};

use super::backend::{BackendCaller, HttpClient};
use super::error::ProxyError;
use super::request::{ProxyRequest, RequestParts};
use super::response::ProxyResponse;
use super::shaping::merge;
use super::{Proxy, ProxyFactory};
use crate::resilience::RequestContext;
use crate::routing::EndpointSpec;

/// Backends of one endpoint and the strategy used to call them.
pub struct CallPlan {
    endpoint: String,
    backends: Vec<BackendCaller>,
    sequential: bool,
    concurrent_calls: usize,
}

impl CallPlan {
    pub fn new(spec: &EndpointSpec, client: HttpClient) -> Self {
        Self {
            endpoint: spec.path.clone(),
            backends: spec
                .backends
                .iter()
                .map(|b| BackendCaller::new(b, client.clone()))
                .collect(),
            sequential: spec.sequential,
            concurrent_calls: spec.concurrent_calls.max(1),
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    /// Call one backend, racing `concurrent_calls` copies when there is no body.
    async fn call_backend(
        &self,
        backend: &BackendCaller,
        ctx: &RequestContext,
        request: &RequestParts,
        body: Option<Body>,
        responses: &[Map<String, Value>],
    ) -> Result<ProxyResponse, ProxyError> {
        if body.is_some() || self.concurrent_calls == 1 {
            return backend.call(ctx, request, body, responses).await;
        }
        let calls = (0..self.concurrent_calls)
            .map(|_| Box::pin(backend.call(ctx, request, None, responses)));
        select_ok(calls).await.map(|(response, _)| response)
    }

    async fn call_parallel(
        &self,
        ctx: &RequestContext,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        let last = self.backends.len() - 1;
        let (parts, mut body) = request.into_parts();
        let request = &parts;

        let calls = self.backends.iter().enumerate().map(|(index, backend)| {
            let body = if index == last { body.take() } else { None };
            self.call_backend(backend, ctx, request, body, &[])
        });
        let results = join_all(calls).await;

        let mut data = Map::new();
        let mut is_complete = true;
        let mut first_error = None;
        let mut succeeded = 0;
        let mut passthrough = None;

        for (backend, result) in self.backends.iter().zip(results) {
            match result {
                Ok(response) => {
                    succeeded += 1;
                    if response.io.is_some() {
                        passthrough = Some(response);
                        continue;
                    }
                    is_complete &= response.is_complete;
                    merge(&mut data, response.data);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        endpoint = %self.endpoint,
                        backend = %backend.name(),
                        error = %e,
                        "Backend call failed"
                    );
                    is_complete = false;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(response) = passthrough {
            return Ok(response);
        }
        match first_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(ProxyResponse {
                data,
                is_complete,
                ..ProxyResponse::default()
            }),
        }
    }

    async fn call_sequential(
        &self,
        ctx: &RequestContext,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        let last = self.backends.len() - 1;
        let (request, mut body) = request.into_parts();
        let mut responses: Vec<Map<String, Value>> = Vec::with_capacity(self.backends.len());
        let mut data = Map::new();

        for (index, backend) in self.backends.iter().enumerate() {
            let body = if index == last { body.take() } else { None };
            match self.call_backend(backend, ctx, &request, body, &responses).await {
                Ok(response) => {
                    if response.io.is_some() {
                        return Ok(response);
                    }
                    merge(&mut data, response.data.clone());
                    responses.push(response.data);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        endpoint = %self.endpoint,
                        backend = %backend.name(),
                        position = index,
                        error = %e,
                        "Sequence stopped"
                    );
                    if responses.is_empty() {
                        return Err(e);
                    }
                    return Ok(ProxyResponse::partial(data));
                }
            }
        }

        Ok(ProxyResponse::complete(data))
    }
}

#[async_trait]
impl Proxy for CallPlan {
    async fn call(
        &self,
        ctx: &RequestContext,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        if self.backends.is_empty() {
            return Err(ProxyError::Internal);
        }
        if self.sequential {
            self.call_sequential(ctx, request).await
        } else {
            self.call_parallel(ctx, request).await
        }
    }
}

/// Builds HTTP call plans sharing one connection pool.
#[derive(Clone)]
pub struct HttpProxyFactory {
    client: HttpClient,
}

impl HttpProxyFactory {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyFactory for HttpProxyFactory {
    fn new_proxy(&self, spec: &EndpointSpec) -> Arc<dyn Proxy> {
        Arc::new(CallPlan::new(spec, self.client.clone()))
    }
}
