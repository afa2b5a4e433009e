//! Timeout enforcement.
//!
//! # Responsibilities
//! - Carry the endpoint deadline through the whole backend fan-out
//! - Wrap backend calls with that deadline
//! - Let the orchestrator tell a late success from a real one
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - One absolute deadline per request, never extended by retries or steps
//! - Deadline errors are distinct from transport errors

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::template::Replacer;

/// Per-request scope handed to the call plan.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    request_id: String,
    replacer: Arc<Replacer>,
}

impl RequestContext {
    pub fn new(timeout: Duration, request_id: impl Into<String>, replacer: Replacer) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            request_id: request_id.into(),
            replacer: Arc::new(replacer),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Host placeholder table of the inbound request.
    pub fn replacer(&self) -> &Replacer {
        &self.replacer
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Run `future` until it finishes or the deadline passes.
    pub async fn within<F: Future>(&self, future: F) -> Result<F::Output, time::error::Elapsed> {
        time::timeout_at(self.deadline, future).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(200), "r1", Replacer::new());
        assert_eq!(ctx.within(async { 7 }).await.unwrap(), 7);
        assert!(!ctx.is_expired());
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let ctx = RequestContext::new(Duration::from_millis(20), "r2", Replacer::new());
        let result = ctx
            .within(tokio::time::sleep(Duration::from_millis(200)))
            .await;
        assert!(result.is_err());
        assert!(ctx.is_expired());
    }
}
