//! Terminal handlers and the references routes hold to them.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;

use crate::container::{Container, ResolutionError};
use crate::dispatch::context::{RequestContext, ResponseContext};
use crate::dispatch::error::HandlerError;
use crate::routing::RouteParams;

/// Explicit outcome of a handler.
///
/// `Error` is an application-level failure the client should see (a 400, a
/// 404 for a missing record). Unexpected failures return `Err(HandlerError)`
/// instead and become a 500.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The handler already wrote the response.
    Written,
    /// Status only, empty body.
    Status(StatusCode),
    Text(String),
    Json(serde_json::Value),
    Error { status: StatusCode, message: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }
}

/// Application logic at the end of a middleware chain.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        params: &RouteParams,
    ) -> Result<Reply, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext, &mut ResponseContext, &RouteParams) -> Result<Reply, HandlerError>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        self(req, res, params)
    }
}

type ResolveHandler = Arc<dyn Fn(&Container) -> Result<Arc<dyn Handler>, ResolutionError> + Send + Sync>;

/// How a route obtains its handler at dispatch time.
#[derive(Clone)]
pub struct HandlerRef {
    name: &'static str,
    resolve: ResolveHandler,
}

impl HandlerRef {
    /// Resolve `H` through the container on every dispatch, honoring its lifecycle.
    pub fn service<H: Handler>() -> Self {
        Self {
            name: std::any::type_name::<H>(),
            resolve: Arc::new(|container: &Container| container.resolve::<H>().map(|h| h as Arc<dyn Handler>)),
        }
    }

    /// Use a fixed handler value.
    pub fn instance(handler: Arc<dyn Handler>) -> Self {
        Self {
            name: "instance",
            resolve: Arc::new(move |_: &Container| Ok::<_, ResolutionError>(handler.clone())),
        }
    }

    /// Wrap a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut RequestContext, &mut ResponseContext, &RouteParams) -> Result<Reply, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let handler: Arc<dyn Handler> = Arc::new(f);
        Self {
            name: "fn",
            resolve: Arc::new(move |_: &Container| Ok::<_, ResolutionError>(handler.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(&self, container: &Container) -> Result<Arc<dyn Handler>, ResolutionError> {
        (self.resolve)(container)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRef").field(&self.name).finish()
    }
}
