//! Fan-out API gateway.
//!
//! One public endpoint is served by calling one or more backends, in parallel
//! or in sequence, and merging their responses into a single rendered body.

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod render;
pub mod routing;
pub mod template;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use render::RenderRegistry;
