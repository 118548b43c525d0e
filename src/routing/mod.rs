//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     (method, "/user/{id}", handler, middleware)
//!     → pattern.rs (compile into literal / placeholder segments)
//!     → table.rs (append to the method's list)
//!     → frozen inside the Dispatcher
//!
//! Incoming Request (method, path)
//!     → table.rs (method lookup, ordered scan)
//!     → pattern.rs (anchored segment match, parameter capture)
//!     → Return: RouteMatch or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod pattern;
pub mod table;

pub use pattern::{Pattern, PatternError, RouteParams};
pub use table::{Route, RouteMatch, RouteTable};
