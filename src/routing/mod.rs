//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     EndpointConfig[]
//!     → endpoint.rs (validate, compile backend templates)
//!     → router.rs (group by path, check with matchit)
//!     → axum Router (one dispatcher per path)
//!
//! Incoming Request (method, path)
//!     → axum path match + RawPathParams
//!     → dispatcher picks the endpoint for the method
//!     → http::handler::EndpointHandler
//! ```
//!
//! # Design Decisions
//! - Endpoints compiled at startup, immutable at runtime
//! - Invalid endpoints are skipped and reported, never fatal
//! - Deterministic: same input always matches same endpoint

pub mod endpoint;
pub mod router;

pub use endpoint::{BackendEncoding, BackendSpec, CompileError, EndpointSpec};
pub use router::{build_router, Registration};
