//! Request dispatch core: route table, dependency container, middleware
//! chain and dispatcher, with an Axum transport in front.

pub mod app;
pub mod config;
pub mod container;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use config::schema::AppConfig;
pub use container::{Container, ContainerBuilder, ResolutionError};
pub use dispatch::{Dispatcher, HandlerRef, Reply, RequestContext, ResponseContext};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use middleware::{Middleware, MiddlewareRef};
pub use routing::RouteTable;
