//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router from the endpoint configuration
//! - Wire up middleware (tracing, body limit, request ID)
//! - Bind server to listener with client address info
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::lifecycle::Shutdown;
use crate::proxy::{HttpProxyFactory, ProxyFactory};
use crate::render::RenderRegistry;
use crate::routing::{build_router, Registration};

/// HTTP server for the gateway.
pub struct GatewayServer {
    config: GatewayConfig,
    renders: Arc<RenderRegistry>,
    factory: Arc<dyn ProxyFactory>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            renders: Arc::new(RenderRegistry::new()),
            factory: Arc::new(HttpProxyFactory::new()),
        }
    }

    /// Share a registry so renderers registered later still apply.
    pub fn with_render_registry(mut self, renders: Arc<RenderRegistry>) -> Self {
        self.renders = renders;
        self
    }

    pub fn with_proxy_factory(mut self, factory: Arc<dyn ProxyFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn render_registry(&self) -> Arc<RenderRegistry> {
        self.renders.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> (Router, Registration) {
        let (router, registration) =
            build_router(&self.config, self.factory.as_ref(), self.renders.clone());
        let router = router
            .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        (router, registration)
    }

    /// Serve until `shutdown` triggers, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let (router, registration) = self.router();

        tracing::info!(
            address = %addr,
            endpoints = registration.registered.len(),
            "HTTP server starting"
        );

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
