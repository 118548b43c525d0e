//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum + tower-http layers: request ID, trace, timeout)
//!     → request.rs (buffer body, build RequestContext)
//!     → Dispatcher::dispatch (blocking pool)
//!     → response.rs (Response → axum response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_request, request_id, BodyError, Incoming, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
