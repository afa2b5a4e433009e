//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of gateway-wide settings (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Endpoint-level problems are not fatal here; the router skips the
//!   offending endpoint and keeps serving the rest

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("{field} must start with '/', got {value:?}")]
    Pattern { field: &'static str, value: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    for (field, value, enabled) in [
        ("debug_pattern", &config.debug_pattern, config.debug_endpoint),
        ("echo_pattern", &config.echo_pattern, config.echo_endpoint),
    ] {
        if enabled && !value.starts_with('/') {
            errors.push(ValidationError::Pattern {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeout_ms = 0;
        config.debug_endpoint = true;
        config.debug_pattern = "__debug".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroTimeout));
    }

    #[test]
    fn test_disabled_handlers_are_not_checked() {
        let mut config = GatewayConfig::default();
        config.echo_pattern = "echo".into();
        assert!(validate_config(&config).is_ok());
    }
}
