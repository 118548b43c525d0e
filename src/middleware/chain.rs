//! Middleware chain composition.
//!
//! The chain is a set of nested continuations built right to left:
//!
//! ```text
//! [m1, m2, m3] + H  →  m1(next = m2(next = m3(next = H)))
//! ```
//!
//! Request phases therefore run m1, m2, m3 and response phases run m3, m2,
//! m1. A middleware that drops its `Next` ends the chain there.

use std::sync::Arc;

use crate::dispatch::boundary;
use crate::dispatch::{HandlerError, RequestContext, ResponseContext};
use crate::middleware::Middleware;

type Continuation<'a> =
    Box<dyn FnOnce(&mut RequestContext, &mut ResponseContext) -> Result<(), HandlerError> + 'a>;

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    inner: Continuation<'a>,
}

impl<'a> Next<'a> {
    fn new(inner: Continuation<'a>) -> Self {
        Self { inner }
    }

    /// Run everything downstream.
    ///
    /// Downstream failures are converted to a 500 before this returns, so the
    /// caller's response phase always sees a finished response.
    pub fn run(self, req: &mut RequestContext, res: &mut ResponseContext) -> Result<(), HandlerError> {
        boundary::contain(req, res, self.inner);
        Ok(())
    }
}

/// A composed chain ready to execute once.
pub struct MiddlewareChain<'a> {
    entry: Continuation<'a>,
    len: usize,
}

impl<'a> MiddlewareChain<'a> {
    /// Wrap `terminal` in `middleware`, outermost first.
    pub fn build<T>(middleware: &'a [Arc<dyn Middleware>], terminal: T) -> Self
    where
        T: FnOnce(&mut RequestContext, &mut ResponseContext) -> Result<(), HandlerError> + 'a,
    {
        let mut next: Continuation<'a> = Box::new(terminal);
        for layer in middleware.iter().rev() {
            let downstream = Next::new(next);
            next = Box::new(move |req: &mut RequestContext, res: &mut ResponseContext| {
                layer.handle(req, res, downstream)
            });
        }

        Self {
            entry: next,
            len: middleware.len(),
        }
    }

    /// Number of middleware wrapped around the terminal.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Call the outermost middleware (or the terminal if there is none).
    pub fn run(self, req: &mut RequestContext, res: &mut ResponseContext) -> Result<(), HandlerError> {
        (self.entry)(req, res)
    }
}
