//! Dispatch error taxonomy.

use axum::http::Method;
use thiserror::Error;

use crate::container::ResolutionError;

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// A failure raised by application code while the chain runs.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Other(DynError),
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn other(err: impl Into<DynError>) -> Self {
        Self::Other(err.into())
    }
}

/// Why the dispatcher produced a 404 or 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("failed to resolve {target} for route `{route}`: {source}")]
    Resolution {
        route: String,
        target: String,
        #[source]
        source: ResolutionError,
    },

    #[error("request failed: {0}")]
    Handler(#[source] HandlerError),
}

impl DispatchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound { .. })
    }
}
