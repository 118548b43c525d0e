//! dispatch-core server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum + tower-http)
//!                          │
//!                          ▼
//!                     Dispatcher ──▶ RouteTable ──▶ no match: 404
//!                          │
//!                          ▼
//!                     Container (handler + middleware resolution)
//!                          │
//!                          ▼
//!                     MiddlewareChain ──▶ Handler
//!                          │
//!     Client Response      ▼
//!     ◀────────────── ResponseContext
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dispatch_core::app;
use dispatch_core::config::{load_config, AppConfig};
use dispatch_core::http::HttpServer;
use dispatch_core::lifecycle::{signals, startup, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "dispatch-core", version, about = "Request dispatch server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    startup::init_observability(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dispatch-core starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        auth = config.security.api_token.is_some(),
        "Configuration loaded"
    );

    let container = Arc::new(app::build_container(&config));
    let warmed = container.warm_up()?;
    tracing::info!(singletons = warmed, "Container warmed up");

    let dispatcher = Arc::new(app::build_dispatcher(container, &config)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, dispatcher);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
