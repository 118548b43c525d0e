//! Startup orchestration.
//!
//! # Responsibilities
//! - Install logging and metrics from configuration
//! - Feed configured primitives into the container
//!
//! # Design Decisions
//! - Observability first so every later step is logged
//! - Configuration reaches services only through container parameters

use crate::config::AppConfig;
use crate::container::ContainerBuilder;
use crate::observability::{logging, metrics};

/// Install logging and, when enabled, the metrics exporter.
pub fn init_observability(config: &AppConfig) {
    if !logging::init_logging(&config.observability) {
        tracing::debug!("Global subscriber already installed");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}

/// Register configured primitives as container parameters.
///
/// `[parameters]` entries are added verbatim; `security.api_token` becomes
/// `auth_token` and `security.enable_headers` becomes `security_headers`.
pub fn apply_parameters(mut builder: ContainerBuilder, config: &AppConfig) -> ContainerBuilder {
    for (name, value) in &config.parameters {
        builder = builder.parameter(name.clone(), value.clone());
    }
    if let Some(token) = &config.security.api_token {
        builder = builder.parameter("auth_token", token.clone());
    }
    builder.parameter("security_headers", config.security.enable_headers)
}
