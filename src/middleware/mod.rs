//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → resolve MiddlewareRef[] through the container
//!     → chain.rs composes them around the terminal handler
//!     → m1 request phase → m2 request phase → … → handler
//!     → … → m2 response phase → m1 response phase
//! ```
//!
//! # Design Decisions
//! - One capability: `handle(req, res, next)`
//! - Not calling `next` is a short circuit, not an error
//! - Middleware are resolved per dispatch so their lifecycle is the container's call

pub mod access_log;
pub mod auth;
pub mod chain;
pub mod security_headers;

use std::fmt;
use std::sync::Arc;

use crate::container::{Container, ResolutionError};
use crate::dispatch::{HandlerError, RequestContext, ResponseContext};

pub use access_log::AccessLog;
pub use auth::{BearerAuth, Identity};
pub use chain::{MiddlewareChain, Next};
pub use security_headers::SecurityHeaders;

/// A unit of the chain of responsibility.
pub trait Middleware: Send + Sync + 'static {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: Next<'_>,
    ) -> Result<(), HandlerError>;
}

/// Middleware backed by a closure. Built with [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext, &mut ResponseContext, Next<'_>) -> Result<(), HandlerError>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: Next<'_>,
    ) -> Result<(), HandlerError> {
        (self.f)(req, res, next)
    }
}

pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut RequestContext, &mut ResponseContext, Next<'_>) -> Result<(), HandlerError>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware { f }
}

type ResolveMiddleware =
    Arc<dyn Fn(&Container) -> Result<Arc<dyn Middleware>, ResolutionError> + Send + Sync>;

/// How a route or the dispatcher obtains a middleware at dispatch time.
#[derive(Clone)]
pub struct MiddlewareRef {
    name: &'static str,
    resolve: ResolveMiddleware,
}

impl MiddlewareRef {
    /// Resolve `M` through the container.
    pub fn service<M: Middleware>() -> Self {
        Self {
            name: std::any::type_name::<M>(),
            resolve: Arc::new(|container: &Container| {
                container.resolve::<M>().map(|m| m as Arc<dyn Middleware>)
            }),
        }
    }

    /// Use a fixed middleware value.
    pub fn instance<M: Middleware>(middleware: M) -> Self {
        let middleware: Arc<dyn Middleware> = Arc::new(middleware);
        Self {
            name: std::any::type_name::<M>(),
            resolve: Arc::new(move |_: &Container| Ok::<_, ResolutionError>(middleware.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(&self, container: &Container) -> Result<Arc<dyn Middleware>, ResolutionError> {
        (self.resolve)(container)
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MiddlewareRef").field(&self.name).finish()
    }
}
