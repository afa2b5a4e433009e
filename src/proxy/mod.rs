//! Backend proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (from http::request)
//!     → plan.rs (parallel or sequential call plan)
//!     → backend.rs (resolve template, call host, decode body)
//!     → shaping.rs (allow-list, mapping, group, merge)
//!     → ProxyResponse (data + completeness + metadata)
//! ```
//!
//! # Design Decisions
//! - The orchestrator only sees the `Proxy` trait, so call plans can be swapped
//! - One pooled hyper client is shared by every endpoint
//! - A backend failure degrades the response instead of failing it

pub mod backend;
pub mod error;
pub mod plan;
pub mod request;
pub mod response;
pub mod shaping;

use std::sync::Arc;

use async_trait::async_trait;

use crate::resilience::RequestContext;
use crate::routing::EndpointSpec;

pub use backend::BackendCaller;
pub use error::ProxyError;
pub use plan::{CallPlan, HttpProxyFactory};
pub use request::{ProxyRequest, RequestParts};
pub use response::{Metadata, ProxyResponse};
pub use shaping::Shaping;

/// Turns a `ProxyRequest` into a merged `ProxyResponse`.
#[async_trait]
pub trait Proxy: Send + Sync {
    async fn call(
        &self,
        ctx: &RequestContext,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, ProxyError>;
}

/// Builds the proxy serving one compiled endpoint.
pub trait ProxyFactory: Send + Sync {
    fn new_proxy(&self, spec: &EndpointSpec) -> Arc<dyn Proxy>;
}
