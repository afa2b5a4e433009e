//! Route registration.
//!
//! # Responsibilities
//! - Compile every configured endpoint, skipping the invalid ones
//! - Group endpoints sharing a path behind one method dispatcher
//! - Mount the optional debug and echo endpoints
//!
//! # Design Decisions
//! - Paths are checked with `matchit` before they reach axum, so a bad
//!   pattern is skipped instead of aborting startup
//! - Unknown methods on a known path reach the first handler, which answers 405

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;

use super::endpoint::{validate_pattern, CompileError, EndpointSpec};
use crate::config::GatewayConfig;
use crate::http::debug::{debug_handler, echo_handler};
use crate::http::handler::EndpointHandler;
use crate::proxy::ProxyFactory;
use crate::render::RenderRegistry;

/// What happened to each configured endpoint.
#[derive(Debug, Default)]
pub struct Registration {
    pub registered: Vec<(Method, String)>,
    pub skipped: Vec<(String, CompileError)>,
}

/// Endpoints mounted on one path.
struct RouteGroup {
    handlers: Vec<Arc<EndpointHandler>>,
}

impl RouteGroup {
    async fn dispatch(self: Arc<Self>, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();
        let params: Vec<(String, String)> = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => Vec::new(),
        };
        let request = Request::from_parts(parts, body);

        let handler = self
            .handlers
            .iter()
            .find(|h| h.spec().method == *request.method())
            .or_else(|| self.handlers.first());
        match handler {
            Some(handler) => handler.handle(request, params).await,
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

#[derive(Default)]
struct RouteTable {
    paths: matchit::Router<()>,
    groups: BTreeMap<String, Vec<Arc<EndpointHandler>>>,
}

impl RouteTable {
    /// Claim `path` for a new route.
    fn reserve(&mut self, path: &str) -> Result<(), CompileError> {
        validate_pattern(path)?;
        self.paths.insert(path, ())?;
        Ok(())
    }

    fn insert(&mut self, handler: EndpointHandler) -> Result<(), CompileError> {
        let path = handler.spec().path.clone();
        let method = handler.spec().method.clone();

        if let Some(group) = self.groups.get_mut(&path) {
            if group.iter().any(|h| h.spec().method == method) {
                return Err(CompileError::DuplicateRoute { method, path });
            }
            group.push(Arc::new(handler));
            return Ok(());
        }

        self.reserve(&path)?;
        self.groups.insert(path, vec![Arc::new(handler)]);
        Ok(())
    }
}

/// Build the axum router serving every valid endpoint of `config`.
pub fn build_router(
    config: &GatewayConfig,
    factory: &dyn ProxyFactory,
    renders: Arc<RenderRegistry>,
) -> (Router, Registration) {
    let mut router = Router::new();
    let mut table = RouteTable::default();
    let mut registration = Registration::default();

    if config.debug_endpoint {
        router = mount_diagnostic(router, &mut table, &config.debug_pattern, "debug", || {
            any(debug_handler)
        });
    }
    if config.echo_endpoint {
        router = mount_diagnostic(router, &mut table, &config.echo_pattern, "echo", || {
            any(echo_handler)
        });
    }

    for endpoint in &config.endpoints {
        let result = EndpointSpec::compile(endpoint, config).and_then(|spec| {
            let spec = Arc::new(spec);
            let proxy = factory.new_proxy(&spec);
            let method = spec.method.clone();
            table.insert(EndpointHandler::new(spec, proxy, renders.clone()))?;
            Ok(method)
        });

        match result {
            Ok(method) => {
                tracing::debug!(method = %method, path = %endpoint.url_pattern, "Endpoint registered");
                registration.registered.push((method, endpoint.url_pattern.clone()));
            }
            Err(e) => {
                tracing::error!(
                    method = %endpoint.method,
                    path = %endpoint.url_pattern,
                    error = %e,
                    "Skipping endpoint"
                );
                registration.skipped.push((endpoint.url_pattern.clone(), e));
            }
        }
    }

    for (path, handlers) in table.groups {
        let group = Arc::new(RouteGroup { handlers });
        router = router.route(
            &path,
            any(move |request: Request<Body>| group.clone().dispatch(request)),
        );
    }

    tracing::info!(
        registered = registration.registered.len(),
        skipped = registration.skipped.len(),
        "Endpoints registered"
    );
    (router, registration)
}

/// Mount a diagnostic handler on `pattern` and everything below it.
fn mount_diagnostic<F>(
    mut router: Router,
    table: &mut RouteTable,
    pattern: &str,
    name: &str,
    handler: F,
) -> Router
where
    F: Fn() -> axum::routing::MethodRouter,
{
    let base = pattern.trim_end_matches('/');
    let nested = format!("{base}/{{*any}}");

    for path in [base, nested.as_str()] {
        match table.reserve(path) {
            Ok(()) => router = router.route(path, handler()),
            Err(e) => tracing::error!(endpoint = name, path, error = %e, "Skipping diagnostic route"),
        }
    }
    router
}
