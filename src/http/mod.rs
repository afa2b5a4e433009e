//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → routing::router (path match, method dispatch)
//!     → handler.rs (method check, deadline, proxy call)
//!         → request.rs (ProxyRequest: params, headers, query, body)
//!     → response.rs (completeness marker, cache header)
//!     → render::Render (body)
//!     → Send to client
//! ```

pub mod debug;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::EndpointHandler;
pub use request::build_proxy_request;
pub use response::{Outcome, COMPLETE_RESPONSE_HEADER};
pub use server::GatewayServer;
