//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! (method, path, RequestContext, ResponseContext)
//!     → dispatcher.rs   route lookup            no match → 404
//!     → dispatcher.rs   resolve handler + mw    failure  → 500
//!     → middleware::chain                       compose continuations
//!     → boundary.rs     run each stage          failure  → 500
//!     → ResponseContext (finalized)
//! ```

pub(crate) mod boundary;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;

pub use context::{RequestContext, Response, ResponseContext};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{DispatchError, HandlerError};
pub use handler::{Handler, HandlerRef, Reply};
