//! Structured access logging around the chain.

use std::time::Instant;

use uuid::Uuid;

use crate::container::{Arguments, Autowire, Dependency, ResolutionError};
use crate::dispatch::{HandlerError, RequestContext, ResponseContext};
use crate::http::request::request_id;
use crate::middleware::{Middleware, Next};

/// Logs every request once the response phase reaches it.
#[derive(Debug, Clone, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: Next<'_>,
    ) -> Result<(), HandlerError> {
        let start = Instant::now();
        let request_id = request_id(req)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tracing::debug!(
            request_id = %request_id,
            method = %req.method(),
            path = %req.path(),
            "Dispatching request"
        );

        next.run(req, res)?;

        tracing::info!(
            request_id = %request_id,
            method = %req.method(),
            path = %req.path(),
            route = res.route().unwrap_or("none"),
            status = res.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(())
    }
}

impl Autowire for AccessLog {
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn construct(_: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}
