//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (gateway-wide semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → routing compiles each EndpointConfig into an EndpointSpec
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; endpoints are compiled once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BackendConfig, EndpointConfig, GatewayConfig, ListenerConfig, ObservabilityConfig};
pub use validation::ValidationError;
