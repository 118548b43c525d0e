//! Security response headers.
//!
//! Added in the response phase and only when the handler did not set them,
//! so routes can still override a default.

use axum::http::{header, HeaderName, HeaderValue};

use crate::container::{Arguments, Autowire, Dependency, ResolutionError};
use crate::dispatch::{HandlerError, RequestContext, ResponseContext};
use crate::middleware::{Middleware, Next};

const DEFAULTS: [(HeaderName, &str); 3] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
];

#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    enabled: bool,
}

impl SecurityHeaders {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Middleware for SecurityHeaders {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: Next<'_>,
    ) -> Result<(), HandlerError> {
        next.run(req, res)?;

        if self.enabled {
            let headers = res.headers_mut();
            for (name, value) in DEFAULTS {
                headers
                    .entry(name)
                    .or_insert_with(|| HeaderValue::from_static(value));
            }
        }
        Ok(())
    }
}

impl Autowire for SecurityHeaders {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::param_or("security_headers", true)]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self::new(args.boolean()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use std::sync::Arc;

    fn run(layer: SecurityHeaders, preset_frame: bool) -> ResponseContext {
        let layers: Vec<Arc<dyn Middleware>> = vec![Arc::new(layer)];
        let chain = MiddlewareChain::build(&layers, move |_, res| {
            if preset_frame {
                res.headers_mut()
                    .insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
            }
            Ok(())
        });
        let mut req = RequestContext::new();
        let mut res = ResponseContext::new();
        chain.run(&mut req, &mut res).unwrap();
        res
    }

    #[test]
    fn test_headers_added() {
        let res = run(SecurityHeaders::default(), false);
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()["x-frame-options"], "DENY");
        assert_eq!(res.headers()["referrer-policy"], "no-referrer");
    }

    #[test]
    fn test_handler_value_wins() {
        let res = run(SecurityHeaders::default(), true);
        assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
    }

    #[test]
    fn test_disabled() {
        let res = run(SecurityHeaders::new(false), false);
        assert!(res.headers().is_empty());
    }
}
