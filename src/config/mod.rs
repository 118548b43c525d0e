//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → read once at startup to build the container and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the route table and bindings depend on it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AppConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ParameterValue;
pub use validation::ValidationError;
