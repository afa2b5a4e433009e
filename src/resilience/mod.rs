//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to endpoint:
//!     → timeouts.rs (absolute deadline for the whole call plan)
//!     → every backend call runs under that deadline
//!     → orchestrator re-checks expiry after the plan returns
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries at this layer; a failed call is classified, not repeated

pub mod timeouts;

pub use timeouts::RequestContext;
