//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Pick pretty or JSON output
//! - Let `RUST_LOG` override the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Installation is idempotent so tests and the binary can both call it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    let level = config.log_level.to_lowercase();
    format!("dispatch_core={level},tower_http={level}")
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.is_ok()
}
