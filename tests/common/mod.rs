//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dispatch_core::config::AppConfig;
use dispatch_core::container::Container;
use dispatch_core::dispatch::{Dispatcher, DispatcherBuilder};
use dispatch_core::http::HttpServer;
use dispatch_core::lifecycle::Shutdown;
use dispatch_core::middleware::{from_fn, MiddlewareRef};

/// Ordered record of what ran during a dispatch.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Middleware that records `before:<name>` and `after:<name>` around `next`.
pub fn recording_middleware(name: &'static str, log: &EventLog) -> MiddlewareRef {
    let log = log.clone();
    MiddlewareRef::instance(from_fn(move |req, res, next| {
        log.record(format!("before:{name}"));
        next.run(req, res)?;
        log.record(format!("after:{name}"));
        Ok(())
    }))
}

pub fn builder_with(container: Container) -> DispatcherBuilder {
    Dispatcher::builder(Arc::new(container))
}

/// A server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_server(config: AppConfig, dispatcher: Dispatcher) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, Arc::new(dispatcher));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}
