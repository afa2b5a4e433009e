//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http::handler, proxy::backend, routing::router produce:
//!     → logging.rs (structured log events, request_id field)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
