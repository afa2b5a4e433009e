//! Backend path templates.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     endpoint url_pattern → params.rs (extract endpoint ParamsSet)
//!     backend url_pattern  → params.rs (mark names the endpoint lacks)
//!                          → ast.rs (consume chain refs, unmark the rest)
//!                          → Template (immutable, shared via Arc)
//!
//! Per request:
//!     Template + path params + earlier responses + replacer.rs
//!         → concrete backend path
//! ```
//!
//! # Design Decisions
//! - String rewriting only happens at compile time
//! - Endpoint parameters win over same-named backend fields
//! - Chain references are explicit: `{respN_.field}` reads backend N

pub mod ast;
pub mod params;
pub mod replacer;

use thiserror::Error;

pub use ast::{Scope, Segment, Template};
pub use params::{
    extract_params, mark_chain_placeholder, rewrite_for_chaining, rewrite_host_placeholders,
    ParamsSet,
};
pub use replacer::Replacer;

/// A placeholder that could not be turned into a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("unrecognized placeholder {{{0}}}")]
    Unknown(String),

    #[error("placeholder {{{0}}} resolved to an empty value")]
    Empty(String),

    #[error("missing endpoint parameter {{{0}}}")]
    MissingParam(String),

    #[error("backend {index} response has no usable field {field:?}")]
    MissingChainField { index: usize, field: String },
}
